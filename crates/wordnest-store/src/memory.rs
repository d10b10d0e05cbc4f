//! In-memory profile store. Nothing survives a restart; used for tests and dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::ProfileStore;
use wordnest_core::types::{ProfileUpdate, UserId, UserProfile};

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<UserId, UserProfile>>,
    fail_writes: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, simulating an unavailable backend.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Drop a profile, as an operator would.
    pub async fn remove(&self, user: UserId) -> Option<UserProfile> {
        self.profiles.lock().await.remove(&user)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WordNestError::Store("store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, user: UserId) -> Result<Option<UserProfile>> {
        Ok(self.profiles.lock().await.get(&user).cloned())
    }

    async fn upsert(&self, user: UserId, profile: UserProfile) -> Result<()> {
        self.check_writable()?;
        self.profiles.lock().await.insert(user, profile);
        Ok(())
    }

    async fn all(&self) -> Result<HashMap<UserId, UserProfile>> {
        Ok(self.profiles.lock().await.clone())
    }

    async fn update(&self, user: UserId, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        self.check_writable()?;
        let mut profiles = self.profiles.lock().await;
        Ok(profiles.get_mut(&user).map(|profile| {
            update.apply(profile);
            profile.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordnest_core::types::{DeliveryTime, Language, Level};

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryProfileStore::new();
        let profile = UserProfile::new(
            Language::English,
            Level::A2,
            DeliveryTime::new(6, 15).unwrap(),
            String::new(),
        );
        store.set_fail_writes(true);
        assert!(store.upsert(UserId(1), profile.clone()).await.is_err());
        store.set_fail_writes(false);
        store.upsert(UserId(1), profile.clone()).await.unwrap();
        assert_eq!(store.remove(UserId(1)).await, Some(profile));
        assert!(store.get(UserId(1)).await.unwrap().is_none());
    }
}
