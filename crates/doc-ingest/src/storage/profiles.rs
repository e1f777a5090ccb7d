//! SQLite store for reader profiles

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{ProfileCreate, UserProfile};

/// Whether an upsert created a new profile or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// SQLite-based profile store
pub struct ProfileStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProfileStore {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        tracing::info!("Profile store opened at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                grade INTEGER NOT NULL,
                interests TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_grade ON profiles(grade);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    /// Create or replace a profile, keeping the original creation time
    pub fn upsert(&self, request: &ProfileCreate) -> Result<(UserProfile, UpsertOutcome)> {
        request.validate()?;

        let conn = self.conn.lock();
        let now = Utc::now();
        let interests = serde_json::to_string(&request.interests)?;

        let existing: Option<DateTime<Utc>> = conn
            .query_row(
                "SELECT created_at FROM profiles WHERE user_id = ?1",
                params![request.user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to read profile: {}", e)))?;

        let (created_at, outcome) = match existing {
            Some(created_at) => (created_at, UpsertOutcome::Updated),
            None => (now, UpsertOutcome::Created),
        };

        conn.execute(
            r#"
            INSERT INTO profiles (user_id, grade, interests, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                grade = excluded.grade,
                interests = excluded.interests,
                updated_at = excluded.updated_at
            "#,
            params![request.user_id, request.grade, interests, created_at, now],
        )
        .map_err(|e| Error::Storage(format!("Failed to upsert profile: {}", e)))?;

        tracing::debug!("Profile {} {:?}", request.user_id, outcome);

        let profile = UserProfile {
            user_id: request.user_id.clone(),
            grade: request.grade,
            interests: request.interests.clone(),
            created_at,
            updated_at: now,
        };
        Ok((profile, outcome))
    }

    /// Get a profile by user id
    pub fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM profiles WHERE user_id = ?1")
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let profile = stmt
            .query_row(params![user_id], row_to_profile)
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to get profile: {}", e)))?;

        Ok(profile)
    }

    /// Delete a profile, returning whether it existed
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM profiles WHERE user_id = ?1", params![user_id])
            .map_err(|e| Error::Storage(format!("Failed to delete profile: {}", e)))?;
        Ok(deleted > 0)
    }

    /// List all profiles, most recently updated first
    pub fn list(&self) -> Result<Vec<UserProfile>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM profiles ORDER BY updated_at DESC")
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let profiles = stmt
            .query_map([], row_to_profile)
            .map_err(|e| Error::Storage(format!("Failed to list profiles: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(profiles)
    }
}

fn row_to_profile(row: &Row) -> rusqlite::Result<UserProfile> {
    let interests: String = row.get("interests")?;
    let interests = serde_json::from_str(&interests).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(UserProfile {
        user_id: row.get("user_id")?,
        grade: row.get("grade")?,
        interests,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
