//! # WordNest Scheduler
//!
//! One recurring timer per learner, each an independent tokio task that sleeps
//! until its next fire instant and then runs the delivery handler.
//!
//! ## Architecture
//! ```text
//! Scheduler
//!   ├── user 1001: sleep → fire 09:00 Asia/Tehran → rearm
//!   ├── user 1002: sleep → fire 21:30 Asia/Tehran → rearm
//!   └── on fire → FireHandler (DeliveryHandler)
//!                   ├── ProfileStore.get
//!                   ├── Catalog lookup, cursor wrap
//!                   ├── Notifier.send
//!                   └── ProfileStore.update (cursor CAS)
//! ```

pub mod clock;
pub mod delivery;
pub mod engine;
pub mod schedule;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use delivery::DeliveryHandler;
pub use engine::{FireHandler, FireOutcome, Scheduler};
pub use schedule::{first_fire, next_fire};
