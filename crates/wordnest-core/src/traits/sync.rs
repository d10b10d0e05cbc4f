//! Remote record-keeping.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{UserId, UserProfile};

/// Mirrors a committed profile to an external system. Best effort.
#[async_trait]
pub trait ProfileSync: Send + Sync {
    async fn push(&self, user: UserId, profile: &UserProfile) -> Result<()>;
}
