//! Bot service: runs each inbound message through the dialogue and executes
//! the resulting effect: persist + arm + sync on commit, cancel + deactivate on
//! `/cancel`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wordnest_core::traits::{Notifier, ProfileStore, ProfileSync};
use wordnest_core::types::{IncomingMessage, OutgoingMessage, ProfileUpdate, UserId, UserProfile};
use wordnest_core::error::Result;
use wordnest_scheduler::Scheduler;

use crate::dialogue::{self, DialogueOptions, DialogueSession, Effect, Input, Stage};

const SAVE_FAILED: &str = "Sorry, your settings could not be saved. Please send /start to try again.";

/// The WordNest bot: dialogue sessions plus the services their effects touch.
pub struct WordNestBot {
    store: Arc<dyn ProfileStore>,
    scheduler: Scheduler,
    notifier: Arc<dyn Notifier>,
    sync: Option<Arc<dyn ProfileSync>>,
    options: DialogueOptions,
    sessions: Mutex<HashMap<UserId, DialogueSession>>,
}

impl WordNestBot {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        scheduler: Scheduler,
        notifier: Arc<dyn Notifier>,
        options: DialogueOptions,
    ) -> Self {
        Self {
            store,
            scheduler,
            notifier,
            sync: None,
            options,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Mirror committed profiles to a remote record endpoint.
    pub fn with_sync(mut self, sync: Arc<dyn ProfileSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, DialogueSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current dialogue stage for `user`, if a dialogue is in progress.
    pub fn stage(&self, user: UserId) -> Option<Stage> {
        self.sessions().get(&user).map(DialogueSession::stage)
    }

    /// Handle one inbound message. Messages from the same user must not be
    /// handled concurrently; [`crate::Inbox`] guarantees that.
    pub async fn handle(&self, msg: IncomingMessage) {
        let user = msg.user_id;
        let session = self.sessions().remove(&user);
        let before = session.as_ref().map(DialogueSession::stage);

        let transition = dialogue::advance(session, Input::parse(&msg.text), &self.options);

        let after = transition.session.as_ref().map(DialogueSession::stage);
        if before != after {
            tracing::debug!("Dialogue for user {user}: {before:?} -> {after:?}");
        }
        if let Some(next) = transition.session {
            self.sessions().insert(user, next);
        }

        let mut reply = OutgoingMessage::text(user, transition.reply.text)
            .with_markup(transition.reply.markup);

        match transition.effect {
            Some(Effect::Commit(profile)) => {
                if let Err(e) = self.commit(user, profile).await {
                    tracing::error!("Failed to save profile for user {user}: {e}");
                    reply = OutgoingMessage::text(user, SAVE_FAILED);
                }
            }
            Some(Effect::Cancel) => self.cancel(user).await,
            None => {}
        }

        if let Err(e) = self.notifier.send(reply).await {
            tracing::warn!("Failed to reply to user {user}: {e}");
        }
    }

    /// Persist the profile, then (re)arm the timer and kick off remote sync.
    /// The timer is only armed once the profile is durable.
    async fn commit(&self, user: UserId, profile: UserProfile) -> Result<()> {
        self.store.upsert(user, profile.clone()).await?;
        let first = self.scheduler.arm(user, profile.time);
        tracing::info!(
            "User {user} subscribed: {} {} at {} (first delivery {first})",
            profile.language,
            profile.level,
            profile.time
        );

        if let Some(sync) = self.sync.clone() {
            tokio::spawn(async move {
                if let Err(e) = sync.push(user, &profile).await {
                    tracing::warn!("Profile sync failed for user {user}: {e}");
                }
            });
        }
        Ok(())
    }

    async fn cancel(&self, user: UserId) {
        let had_timer = self.scheduler.cancel(user);
        match self.store.update(user, ProfileUpdate::Deactivate).await {
            Ok(Some(_)) => tracing::info!("User {user} unsubscribed"),
            Ok(None) if had_timer => tracing::info!("User {user} unsubscribed (no stored profile)"),
            Ok(None) => tracing::debug!("Cancel for user {user} with nothing scheduled"),
            Err(e) => tracing::error!("Failed to deactivate profile for user {user}: {e}"),
        }
    }

    /// Arm timers for every active stored profile. Run once at startup.
    /// Returns how many timers were armed.
    pub async fn restore_schedules(&self) -> Result<usize> {
        let profiles = self.store.all().await?;
        let mut armed = 0;
        for (user, profile) in profiles {
            if !profile.active {
                continue;
            }
            self.scheduler.arm(user, profile.time);
            armed += 1;
        }
        tracing::info!("Restored {armed} daily schedule(s) from {}", self.store.name());
        Ok(armed)
    }
}
