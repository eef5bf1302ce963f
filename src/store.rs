use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::models::Role;

/// Key names shared with the web client's local storage.
pub mod keys {
    pub const COMPLETED_TOPICS: &str = "dsaCompletedTopics";
    pub const BOOKMARKED_TOPICS: &str = "dsaBookmarkedTopics";
    pub const TOPIC_NOTES: &str = "dsaTopicNotes";
    pub const DARK_MODE: &str = "dsaDarkMode";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const USER_ID: &str = "userId";
    pub const USER_ROLE: &str = "userRole";
}

/// Device-local key/value storage backed by SQLite.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Self::open_at(&data_dir.join("elevate.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open local store at {}", path.display()))?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM local_storage WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read '{}'", key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .with_context(|| format!("Failed to write '{}'", key))?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Reads a JSON value. A value that no longer parses is treated as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unreadable local value");
                Ok(None)
            }
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(key, &raw)
    }
}

/// Signed-in identity, mirrored in local storage like the web auth context.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn load(store: &LocalStore) -> Result<Option<Self>> {
        let token = store.get_item(keys::ACCESS_TOKEN)?;
        let user_id = store.get_item(keys::USER_ID)?;
        let (Some(access_token), Some(user_id)) = (token, user_id) else {
            return Ok(None);
        };
        let role = store.get_json::<Role>(keys::USER_ROLE)?.unwrap_or(Role::Guest);
        Ok(Some(Self { access_token, user_id, role }))
    }

    pub fn save(&self, store: &LocalStore) -> Result<()> {
        store.set_item(keys::ACCESS_TOKEN, &self.access_token)?;
        store.set_item(keys::USER_ID, &self.user_id)?;
        store.set_json(keys::USER_ROLE, &self.role)
    }

    pub fn clear(store: &LocalStore) -> Result<()> {
        store.remove_item(keys::ACCESS_TOKEN)?;
        store.remove_item(keys::USER_ID)?;
        store.remove_item(keys::USER_ROLE)
    }
}
