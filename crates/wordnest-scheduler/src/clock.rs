//! Wall-clock source for the scheduler.

use chrono::{DateTime, Duration, Utc};

/// Current time as seen by timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances with tokio's clock from a fixed origin.
///
/// Under a paused tokio runtime this moves in lockstep with virtual time, so
/// day-long schedules can be exercised instantly.
#[derive(Debug, Clone)]
pub struct AnchoredClock {
    origin: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.anchor.elapsed()).unwrap_or_else(|_| Duration::zero());
        self.origin + elapsed
    }
}

/// How long to sleep until `target`. Zero if it has passed.
pub fn until(clock: &dyn Clock, target: DateTime<Utc>) -> std::time::Duration {
    (target - clock.now()).to_std().unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_anchored_clock_follows_tokio_time() {
        let origin = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = AnchoredClock::new(origin);
        tokio::time::advance(std::time::Duration::from_secs(3600)).await;
        assert_eq!(clock.now(), origin + Duration::hours(1));
    }

    #[test]
    fn test_until_past_target_is_zero() {
        let clock = SystemClock;
        let past = Utc::now() - Duration::seconds(5);
        assert_eq!(until(&clock, past), std::time::Duration::ZERO);
    }
}
