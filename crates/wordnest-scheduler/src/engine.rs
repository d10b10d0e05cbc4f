//! Scheduler engine: owns exactly one recurring timer per learner.
//!
//! Each timer is a tokio task: sleep until the next fire instant, run the fire
//! handler to completion, compute the following instant, repeat. Arming a user
//! that already has a timer swaps the entry under the map lock and signals the
//! old task, so two timers for one user never coexist. Cancellation only stops
//! future fires; a fire already in progress runs to completion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use wordnest_core::config::RearmStrategy;
use wordnest_core::error::Result;
use wordnest_core::types::{DeliveryTime, UserId};

use crate::clock::{self, Clock};
use crate::schedule;

/// What the timer should do after a fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Keep the timer armed.
    Continue,
    /// Remove this timer; no further fires.
    Deregister,
}

/// Invoked each time a learner's timer fires.
///
/// An `Err` is logged and the timer stays armed.
#[async_trait]
pub trait FireHandler: Send + Sync {
    async fn on_fire(&self, user: UserId) -> Result<FireOutcome>;
}

struct TimerEntry {
    id: u64,
    time: DeliveryTime,
    next_fire: Arc<Mutex<DateTime<Utc>>>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TimerEntry {
    fn stop(self) {
        // The task may already have exited; a closed channel is fine.
        let _ = self.cancel.send(true);
        drop(self.task);
    }
}

struct Inner {
    timers: Mutex<HashMap<UserId, TimerEntry>>,
    tz: Tz,
    rearm: RearmStrategy,
    clock: Arc<dyn Clock>,
    handler: Arc<dyn FireHandler>,
    next_id: AtomicU64,
}

impl Inner {
    fn timers(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, TimerEntry>> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove `user`'s timer only if it is still the one identified by `id`.
    fn remove_if_current(&self, user: UserId, id: u64) {
        let mut timers = self.timers();
        if timers.get(&user).is_some_and(|e| e.id == id) {
            timers.remove(&user);
        }
    }
}

/// Per-user daily timers sharing one timezone, rearm strategy and fire handler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        tz: Tz,
        rearm: RearmStrategy,
        clock: Arc<dyn Clock>,
        handler: Arc<dyn FireHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                timers: Mutex::new(HashMap::new()),
                tz,
                rearm,
                clock,
                handler,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.inner.tz
    }

    /// Arm (or re-arm) `user`'s daily timer at local `time`. Any existing timer
    /// for the user is cancelled first. Returns the first fire instant.
    pub fn arm(&self, user: UserId, time: DeliveryTime) -> DateTime<Utc> {
        let inner = &self.inner;
        let first = schedule::first_fire(time, inner.tz, inner.clock.now());
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let next_fire = Arc::new(Mutex::new(first));

        let mut timers = inner.timers();
        let task = tokio::spawn(run_timer(
            inner.clone(),
            user,
            id,
            time,
            first,
            next_fire.clone(),
            cancel_rx,
        ));
        let entry = TimerEntry {
            id,
            time,
            next_fire,
            cancel: cancel_tx,
            task,
        };
        if let Some(old) = timers.insert(user, entry) {
            tracing::debug!("Replaced timer for user {user} (was {})", old.time);
            old.stop();
        }
        drop(timers);

        tracing::info!(
            "⏰ Armed daily lesson for user {user} at {time} {} (first fire {first})",
            inner.tz
        );
        first
    }

    /// Cancel `user`'s timer. Returns whether one was armed.
    pub fn cancel(&self, user: UserId) -> bool {
        let removed = self.inner.timers().remove(&user);
        match removed {
            Some(entry) => {
                entry.stop();
                tracing::info!("🛑 Cancelled timer for user {user}");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, user: UserId) -> bool {
        self.inner.timers().contains_key(&user)
    }

    /// Next scheduled fire for `user`, if armed.
    pub fn next_fire(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.inner.timers().get(&user).map(|e| match e.next_fire.lock() {
            Ok(t) => *t,
            Err(poisoned) => *poisoned.into_inner(),
        })
    }

    pub fn active_count(&self) -> usize {
        self.inner.timers().len()
    }

    /// Cancel every timer.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.inner.timers().drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            entry.stop();
        }
        tracing::info!("Scheduler stopped ({count} timers cancelled)");
    }
}

async fn run_timer(
    inner: Arc<Inner>,
    user: UserId,
    id: u64,
    time: DeliveryTime,
    first: DateTime<Utc>,
    next_fire: Arc<Mutex<DateTime<Utc>>>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut scheduled = first;
    loop {
        let delay = clock::until(inner.clock.as_ref(), scheduled);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            // Fires on an explicit cancel and when the entry is dropped.
            _ = cancel.changed() => {
                tracing::debug!("Timer {id} for user {user} stopped");
                return;
            }
        }
        if *cancel.borrow() {
            return;
        }

        tracing::info!("🔔 Lesson timer fired for user {user}");
        // Spawned so a panicking handler cannot take the timer down with it.
        let handler = inner.handler.clone();
        let outcome = tokio::spawn(async move { handler.on_fire(user).await }).await;
        match outcome {
            Ok(Ok(FireOutcome::Continue)) => {}
            Ok(Ok(FireOutcome::Deregister)) => {
                tracing::info!("Deregistering timer for user {user}");
                inner.remove_if_current(user, id);
                return;
            }
            Ok(Err(e)) => tracing::warn!("⚠️ Fire handler failed for user {user}: {e}"),
            Err(e) => tracing::error!("Fire handler panicked for user {user}: {e}"),
        }

        if *cancel.borrow() {
            return;
        }
        scheduled = schedule::next_fire(inner.rearm, time, inner.tz, scheduled, inner.clock.now());
        match next_fire.lock() {
            Ok(mut t) => *t = scheduled,
            Err(poisoned) => *poisoned.into_inner() = scheduled,
        }
        tracing::debug!("Next fire for user {user}: {scheduled}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::AnchoredClock;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;
    use wordnest_core::error::WordNestError;

    const HOUR: u64 = 3600;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Ok,
        Fail,
        Panic,
        Deregister,
        /// Take this long before completing.
        Slow(u64),
    }

    struct Recorder {
        clock: Arc<AnchoredClock>,
        behaviour: Behaviour,
        fires: Mutex<Vec<(UserId, DateTime<Utc>)>>,
        completed: Mutex<usize>,
    }

    impl Recorder {
        fn new(clock: Arc<AnchoredClock>, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                clock,
                behaviour,
                fires: Mutex::new(Vec::new()),
                completed: Mutex::new(0),
            })
        }

        fn fires(&self) -> Vec<(UserId, DateTime<Utc>)> {
            self.fires.lock().unwrap().clone()
        }

        fn completed(&self) -> usize {
            *self.completed.lock().unwrap()
        }
    }

    #[async_trait]
    impl FireHandler for Recorder {
        async fn on_fire(&self, user: UserId) -> Result<FireOutcome> {
            self.fires.lock().unwrap().push((user, self.clock.now()));
            let outcome = match self.behaviour {
                Behaviour::Ok => Ok(FireOutcome::Continue),
                Behaviour::Fail => Err(WordNestError::Channel("blocked".into())),
                Behaviour::Panic => panic!("handler blew up"),
                Behaviour::Deregister => Ok(FireOutcome::Deregister),
                Behaviour::Slow(secs) => {
                    tokio::time::sleep(StdDuration::from_secs(secs)).await;
                    Ok(FireOutcome::Continue)
                }
            };
            *self.completed.lock().unwrap() += 1;
            outcome
        }
    }

    fn setup(origin: DateTime<Utc>, behaviour: Behaviour) -> (Scheduler, Arc<Recorder>) {
        let clock = Arc::new(AnchoredClock::new(origin));
        let recorder = Recorder::new(clock.clone(), behaviour);
        let scheduler = Scheduler::new(
            chrono_tz::UTC,
            RearmStrategy::WallClock,
            clock,
            recorder.clone(),
        );
        (scheduler, recorder)
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, d, h, 0, 0).unwrap()
    }

    fn nine() -> DeliveryTime {
        DeliveryTime::new(9, 0).unwrap()
    }

    async fn hours(n: u64) {
        tokio::time::sleep(StdDuration::from_secs(n * HOUR)).await;
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        let drift = (actual - expected).num_milliseconds().abs();
        assert!(drift < 50, "fired at {actual}, expected {expected}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fire_next_day_then_daily() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Ok);
        let first = scheduler.arm(UserId(1), nine());
        assert_eq!(first, at(2, 9));
        assert_eq!(scheduler.next_fire(UserId(1)), Some(at(2, 9)));

        hours(22).await;
        assert!(recorder.fires().is_empty());

        hours(2).await; // day 2, 10:00
        let fires = recorder.fires();
        assert_eq!(fires.len(), 1);
        assert_close(fires[0].1, at(2, 9));
        assert_eq!(scheduler.next_fire(UserId(1)), Some(at(3, 9)));

        hours(24).await;
        let fires = recorder.fires();
        assert_eq!(fires.len(), 2);
        assert_close(fires[1].1, at(3, 9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fire_same_day_when_still_ahead() {
        let (scheduler, recorder) = setup(at(1, 8), Behaviour::Ok);
        assert_eq!(scheduler.arm(UserId(1), nine()), at(1, 9));
        hours(2).await;
        assert_eq!(recorder.fires().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_twice_leaves_one_timer() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Ok);
        scheduler.arm(UserId(1), nine());
        scheduler.arm(UserId(1), DeliveryTime::new(12, 0).unwrap());
        assert_eq!(scheduler.active_count(), 1);

        hours(24 * 2).await; // through day 3, 10:00
        let fires = recorder.fires();
        // Only the 12:00 timer survives: day 1 12:00 and day 2 12:00.
        assert_eq!(fires.len(), 2);
        assert_close(fires[0].1, at(1, 12));
        assert_close(fires[1].1, at(2, 12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Ok);
        assert!(!scheduler.cancel(UserId(5)));
        scheduler.arm(UserId(5), nine());
        assert!(scheduler.cancel(UserId(5)));
        assert!(!scheduler.cancel(UserId(5)));
        assert!(!scheduler.is_armed(UserId(5)));

        hours(72).await;
        assert!(recorder.fires().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_error_keeps_timer() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Fail);
        scheduler.arm(UserId(1), nine());
        hours(24 * 3).await;
        assert_eq!(recorder.fires().len(), 3);
        assert!(scheduler.is_armed(UserId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_keeps_timer() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Panic);
        scheduler.arm(UserId(1), nine());
        hours(24 * 2).await;
        assert_eq!(recorder.fires().len(), 2);
        assert!(scheduler.is_armed(UserId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deregister_stops_future_fires() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Deregister);
        scheduler.arm(UserId(1), nine());
        hours(24).await;
        assert_eq!(recorder.fires().len(), 1);
        assert!(!scheduler.is_armed(UserId(1)));

        hours(24 * 3).await;
        assert_eq!(recorder.fires().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_abort_in_flight_fire() {
        let (scheduler, recorder) = setup(at(1, 8), Behaviour::Slow(600));
        scheduler.arm(UserId(1), nine());

        hours(1).await;
        tokio::time::sleep(StdDuration::from_secs(60)).await; // 09:01, fire in progress
        assert_eq!(recorder.fires().len(), 1);
        assert_eq!(recorder.completed(), 0);

        assert!(scheduler.cancel(UserId(1)));
        hours(24 * 2).await;
        assert_eq!(recorder.completed(), 1);
        assert_eq!(recorder.fires().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_during_fire_keeps_new_timer() {
        let (scheduler, recorder) = setup(at(1, 8), Behaviour::Slow(600));
        scheduler.arm(UserId(1), nine());
        tokio::time::sleep(StdDuration::from_secs(HOUR + 60)).await;

        scheduler.arm(UserId(1), DeliveryTime::new(18, 0).unwrap());
        hours(12).await; // 21:01 day 1
        assert!(scheduler.is_armed(UserId(1)));
        let fires = recorder.fires();
        assert_eq!(fires.len(), 2);
        assert_close(fires[1].1, at(1, 18));
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_are_independent() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Ok);
        scheduler.arm(UserId(1), nine());
        scheduler.arm(UserId(2), DeliveryTime::new(11, 0).unwrap());
        scheduler.cancel(UserId(1));

        hours(2).await;
        let fires = recorder.fires();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].0, UserId(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let (scheduler, recorder) = setup(at(1, 10), Behaviour::Ok);
        for id in 0..5 {
            scheduler.arm(UserId(id), nine());
        }
        scheduler.shutdown();
        assert_eq!(scheduler.active_count(), 0);
        hours(48).await;
        assert!(recorder.fires().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_rearm() {
        let origin = at(1, 10);
        let clock = Arc::new(AnchoredClock::new(origin));
        let recorder = Recorder::new(clock.clone(), Behaviour::Ok);
        let scheduler = Scheduler::new(
            chrono_tz::UTC,
            RearmStrategy::FixedInterval,
            clock,
            recorder.clone(),
        );
        scheduler.arm(UserId(1), nine());
        hours(24).await;
        assert_eq!(scheduler.next_fire(UserId(1)).map(|t| t - at(2, 9)), Some(Duration::hours(24)));
    }
}
