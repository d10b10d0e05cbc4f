//! Outbound message channel.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::OutgoingMessage;

/// Delivers text to a learner on the chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name, for logs.
    fn name(&self) -> &str;

    /// Send a message. An `Err` means the platform rejected or never received it.
    async fn send(&self, message: OutgoingMessage) -> Result<()>;
}
