//! Delivery handler: what happens when a learner's timer fires.
//!
//! Load the profile, pick the lesson at the cursor (wrapping to the start once
//! the list is exhausted), send it, advance the cursor. A missing, inactive or
//! content-less profile deregisters the timer. Send and store failures are
//! logged and never reach the learner.

use async_trait::async_trait;
use std::sync::Arc;

use wordnest_core::catalog::Catalog;
use wordnest_core::config::CursorPolicy;
use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::{Notifier, ProfileStore};
use wordnest_core::types::{OutgoingMessage, ProfileUpdate, UserId};

use crate::engine::{FireHandler, FireOutcome};

pub struct DeliveryHandler {
    store: Arc<dyn ProfileStore>,
    catalog: Arc<Catalog>,
    notifier: Arc<dyn Notifier>,
    policy: CursorPolicy,
}

impl DeliveryHandler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        catalog: Arc<Catalog>,
        notifier: Arc<dyn Notifier>,
        policy: CursorPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            policy,
        }
    }
}

#[async_trait]
impl FireHandler for DeliveryHandler {
    async fn on_fire(&self, user: UserId) -> Result<FireOutcome> {
        let profile = match self.store.get(user).await {
            Ok(Some(p)) if p.active => p,
            Ok(Some(_)) => {
                tracing::info!("Profile for user {user} is inactive, dropping timer");
                return Ok(FireOutcome::Deregister);
            }
            Ok(None) => {
                tracing::warn!("No profile for user {user}, dropping timer");
                return Ok(FireOutcome::Deregister);
            }
            Err(WordNestError::CorruptProfile(e)) => {
                tracing::error!("Unreadable profile for user {user}, dropping timer: {e}");
                return Ok(FireOutcome::Deregister);
            }
            // Store unavailable: the timer stays armed and tries again tomorrow.
            Err(e) => return Err(e),
        };

        let lessons = self.catalog.lessons(profile.language, profile.level);
        if lessons.is_empty() {
            tracing::warn!(
                "No lessons for {} {} (user {user}), dropping timer",
                profile.language,
                profile.level
            );
            return Ok(FireOutcome::Deregister);
        }

        let index = if profile.cursor as usize >= lessons.len() {
            0
        } else {
            profile.cursor as usize
        };
        let lesson = &lessons[index];

        let message = OutgoingMessage::text(user, lesson.format());
        let sent = match self.notifier.send(message).await {
            Ok(()) => {
                tracing::info!("📚 Sent '{}' ({}/{}) to user {user}", lesson.word, index + 1, lessons.len());
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to send lesson to user {user} via {}: {e}", self.notifier.name());
                false
            }
        };

        if sent || self.policy == CursorPolicy::AlwaysAdvance {
            let update = ProfileUpdate::AdvanceCursor {
                expected: profile.cursor,
                next: index as u32 + 1,
            };
            if let Err(e) = self.store.update(user, update).await {
                tracing::error!(
                    "Failed to persist cursor for user {user} in {} store: {e}",
                    self.store.name()
                );
            }
        }

        Ok(FireOutcome::Continue)
    }
}
