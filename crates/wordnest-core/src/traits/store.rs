//! Profile persistence.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{ProfileUpdate, UserId, UserProfile};

/// Durable mapping from learner to profile.
///
/// Implementations serialize writes for the same user, and an `upsert` or
/// applied `update` is fully persisted before the call returns.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    async fn get(&self, user: UserId) -> Result<Option<UserProfile>>;

    /// Replace the whole profile.
    async fn upsert(&self, user: UserId, profile: UserProfile) -> Result<()>;

    async fn all(&self) -> Result<HashMap<UserId, UserProfile>>;

    /// Atomic read-modify-write. Returns the stored profile after the update,
    /// or `None` if the user has no profile.
    async fn update(&self, user: UserId, update: ProfileUpdate) -> Result<Option<UserProfile>>;
}
