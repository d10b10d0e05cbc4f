//! Remote record sync: mirrors each committed profile to an external
//! record-keeping endpoint with a shared secret. Best effort: the caller logs
//! failures and moves on.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use wordnest_core::config::SyncConfig;
use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::ProfileSync;
use wordnest_core::types::{UserId, UserProfile};

/// Wire payload posted to the endpoint.
#[derive(Debug, Serialize)]
struct SyncRecord<'a> {
    secret: &'a str,
    user_id: i64,
    language: &'a str,
    level: &'a str,
    time: String,
    email: &'a str,
}

/// HTTP POST sync client.
pub struct HttpProfileSync {
    client: reqwest::Client,
    url: String,
    secret: String,
    timeout: Duration,
}

impl HttpProfileSync {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            secret: config.secret.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn record<'a>(&'a self, user: UserId, profile: &'a UserProfile) -> SyncRecord<'a> {
        SyncRecord {
            secret: &self.secret,
            user_id: user.0,
            language: profile.language.as_str(),
            level: profile.level.as_str(),
            time: profile.time.to_string(),
            email: &profile.email,
        }
    }
}

#[async_trait]
impl ProfileSync for HttpProfileSync {
    async fn push(&self, user: UserId, profile: &UserProfile) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&self.record(user, profile))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| WordNestError::Sync(format!("Sync request failed: {e}")))?;

        if resp.status().is_success() {
            tracing::debug!("Synced profile for user {user}");
            Ok(())
        } else {
            Err(WordNestError::Sync(format!("Sync endpoint returned {}", resp.status())))
        }
    }
}
