//! Seams between components. Every collaborator is injected through one of these.

pub mod notifier;
pub mod store;
pub mod sync;

pub use notifier::Notifier;
pub use store::ProfileStore;
pub use sync::ProfileSync;
