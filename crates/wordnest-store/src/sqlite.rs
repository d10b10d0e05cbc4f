//! SQLite-backed profile store: one row per learner, survives restarts.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use wordnest_core::error::{Result, WordNestError};
use wordnest_core::traits::ProfileStore;
use wordnest_core::types::{DeliveryTime, Language, Level, ProfileUpdate, UserId, UserProfile};

fn db_err(e: rusqlite::Error) -> WordNestError {
    WordNestError::Store(e.to_string())
}

/// SQLite profile store.
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Open or create the profile database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             CREATE TABLE IF NOT EXISTS profiles (
                user_id INTEGER PRIMARY KEY,
                language TEXT NOT NULL,
                level TEXT NOT NULL,
                delivery_time TEXT NOT NULL,   -- HH:MM, process timezone
                email TEXT NOT NULL DEFAULT '',
                cursor INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
             );",
        )
        .map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WordNestError::Store(format!("connection lock poisoned: {e}")))
    }

    fn write_row(conn: &Connection, user: UserId, profile: &UserProfile) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO profiles
             (user_id, language, level, delivery_time, email, cursor, active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.0,
                profile.language.as_str(),
                profile.level.as_str(),
                profile.time.to_string(),
                profile.email,
                profile.cursor,
                profile.active as i32,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, RawProfile)> {
        Ok((
            row.get(0)?,
            RawProfile {
                language: row.get(1)?,
                level: row.get(2)?,
                time: row.get(3)?,
                email: row.get(4)?,
                cursor: row.get(5)?,
                active: row.get::<_, i32>(6)? != 0,
            },
        ))
    }

    fn select_one(conn: &Connection, user: UserId) -> Result<Option<UserProfile>> {
        let raw = conn
            .query_row(
                "SELECT user_id, language, level, delivery_time, email, cursor, active
                 FROM profiles WHERE user_id = ?1",
                params![user.0],
                Self::read_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(|(_, r)| r.into_profile(user)).transpose()
    }
}

/// Row as stored, before enum parsing.
struct RawProfile {
    language: String,
    level: String,
    time: String,
    email: String,
    cursor: u32,
    active: bool,
}

impl RawProfile {
    fn into_profile(self, user: UserId) -> Result<UserProfile> {
        let corrupt = |field: &str, value: &str| {
            WordNestError::CorruptProfile(format!("bad {field} '{value}' for user {user}"))
        };
        Ok(UserProfile {
            language: self.language.parse().map_err(|_| corrupt("language", &self.language))?,
            level: self.level.parse().map_err(|_| corrupt("level", &self.level))?,
            time: DeliveryTime::parse(&self.time).ok_or_else(|| corrupt("time", &self.time))?,
            email: self.email,
            cursor: self.cursor,
            active: self.active,
        })
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, user: UserId) -> Result<Option<UserProfile>> {
        let conn = self.lock()?;
        Self::select_one(&conn, user)
    }

    async fn upsert(&self, user: UserId, profile: UserProfile) -> Result<()> {
        let conn = self.lock()?;
        Self::write_row(&conn, user, &profile)?;
        tracing::debug!("Saved profile for user {user}");
        Ok(())
    }

    async fn all(&self) -> Result<HashMap<UserId, UserProfile>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, language, level, delivery_time, email, cursor, active
                 FROM profiles ORDER BY user_id",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::read_row).map_err(db_err)?;

        let mut profiles = HashMap::new();
        for row in rows {
            let (id, raw) = row.map_err(db_err)?;
            let user = UserId(id);
            // A single bad row must not hide everyone else's schedule.
            match raw.into_profile(user) {
                Ok(profile) => {
                    profiles.insert(user, profile);
                }
                Err(e) => tracing::warn!("Skipping profile row: {e}"),
            }
        }
        Ok(profiles)
    }

    async fn update(&self, user: UserId, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let Some(mut profile) = Self::select_one(&tx, user)? else {
            return Ok(None);
        };
        if update.apply(&mut profile) {
            Self::write_row(&tx, user, &profile)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new(
            Language::French,
            Level::A1,
            DeliveryTime::new(18, 30).unwrap(),
            "x@y.org".into(),
        )
    }

    #[tokio::test]
    async fn test_roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");
        {
            let store = SqliteProfileStore::open(&path).unwrap();
            store.upsert(UserId(7), profile()).await.unwrap();
        }
        let store = SqliteProfileStore::open(&path).unwrap();
        assert_eq!(store.get(UserId(7)).await.unwrap(), Some(profile()));
        assert_eq!(store.get(UserId(8)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.upsert(UserId(1), profile()).await.unwrap();

        let advanced = store
            .update(UserId(1), ProfileUpdate::AdvanceCursor { expected: 0, next: 1 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(advanced.cursor, 1);

        let stale = store
            .update(UserId(1), ProfileUpdate::AdvanceCursor { expected: 0, next: 1 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stale.cursor, 1);

        let inactive = store.update(UserId(1), ProfileUpdate::Deactivate).await.unwrap().unwrap();
        assert!(!inactive.active);
        assert!(!store.get(UserId(1)).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_all_skips_corrupt_rows() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.upsert(UserId(1), profile()).await.unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO profiles (user_id, language, level, delivery_time, updated_at)
                 VALUES (2, 'Klingon', 'A1', '09:00', 'now')",
                [],
            )
            .unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key(&UserId(1)));
        assert!(matches!(
            store.get(UserId(2)).await,
            Err(WordNestError::CorruptProfile(_))
        ));
    }
}
