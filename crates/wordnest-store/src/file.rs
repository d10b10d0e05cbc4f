//! JSON file profile store: the whole collection in one human-readable file.
//! Every mutation rewrites the file through a temp file + fsync + rename, so a
//! crash leaves either the old or the new collection on disk, never a torn one.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::ProfileStore;
use wordnest_core::types::{ProfileUpdate, UserId, UserProfile};

/// File-backed profile store. The in-memory map mirrors the file.
pub struct JsonProfileStore {
    path: PathBuf,
    profiles: Mutex<HashMap<UserId, UserProfile>>,
}

impl JsonProfileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let profiles = Self::load(path)?;
        tracing::debug!("Loaded {} profiles from {}", profiles.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            profiles: Mutex::new(profiles),
        })
    }

    fn load(path: &Path) -> Result<HashMap<UserId, UserProfile>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let json = std::fs::read_to_string(path)?;
        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let rows: BTreeMap<UserId, UserProfile> = serde_json::from_str(&json)
            .map_err(|e| WordNestError::Store(format!("Failed to parse {}: {e}", path.display())))?;
        Ok(rows.into_iter().collect())
    }

    /// Write the full collection atomically.
    fn persist(&self, profiles: &HashMap<UserId, UserProfile>) -> Result<()> {
        let sorted: BTreeMap<&UserId, &UserProfile> = profiles.iter().collect();
        let json = serde_json::to_string_pretty(&sorted)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        sync_dir(&self.path)?;
        tracing::debug!("Saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }
}

/// Flush the directory entry so the rename itself survives a power loss.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn get(&self, user: UserId) -> Result<Option<UserProfile>> {
        Ok(self.profiles.lock().await.get(&user).cloned())
    }

    async fn upsert(&self, user: UserId, profile: UserProfile) -> Result<()> {
        let mut profiles = self.profiles.lock().await;
        let mut next = profiles.clone();
        next.insert(user, profile);
        self.persist(&next)?;
        *profiles = next;
        Ok(())
    }

    async fn all(&self) -> Result<HashMap<UserId, UserProfile>> {
        Ok(self.profiles.lock().await.clone())
    }

    async fn update(&self, user: UserId, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut profiles = self.profiles.lock().await;
        let Some(current) = profiles.get(&user) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        if !update.apply(&mut updated) {
            return Ok(Some(updated));
        }
        let mut next = profiles.clone();
        next.insert(user, updated.clone());
        self.persist(&next)?;
        *profiles = next;
        Ok(Some(updated))
    }
}
