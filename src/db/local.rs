//! Typed key/value persistence on top of the `local_store` table.
//!
//! Reads and writes never fail to the caller. A missing key, a corrupt value
//! or a database error is logged and the caller-supplied default is used.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::Database;

/// Current version of the stored envelope.
pub const STORAGE_VERSION: u32 = 1;

/// Logical keys of everything the app keeps on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Exercises,
    WorkoutSessions,
    CurrentWorkoutDraft,
    GlobalCustomTrackers,
    DeviceId,
    PendingRemoteDeletions,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exercises => "exercises",
            Self::WorkoutSessions => "workout-sessions",
            Self::CurrentWorkoutDraft => "current-workout-draft",
            Self::GlobalCustomTrackers => "global-custom-trackers",
            Self::DeviceId => "device-id",
            Self::PendingRemoteDeletions => "pending-remote-deletions",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    version: u32,
    data: &'a T,
}

/// Values written before the envelope existed are plain JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum Stored<T> {
    Versioned { version: u32, data: T },
    Bare(T),
}

#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Load `key`, falling back to `default` when absent or unreadable.
    pub async fn get<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> T {
        self.get_optional(key).await.unwrap_or(default)
    }

    /// Load `key`, returning `None` when absent or unreadable.
    pub async fn get_optional<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let row: Option<(String,)> =
            match sqlx::query_as("SELECT value FROM local_store WHERE key = ?")
                .bind(key.as_str())
                .fetch_optional(self.db.pool())
                .await
            {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!("Error loading {} from storage: {}", key.as_str(), e);
                    return None;
                }
            };

        let (json,) = row?;

        match serde_json::from_str::<Stored<T>>(&json) {
            Ok(Stored::Versioned { version, data }) => {
                if version > STORAGE_VERSION {
                    tracing::warn!(
                        "{} was written by a newer format (v{}), reading anyway",
                        key.as_str(),
                        version
                    );
                }
                Some(data)
            }
            Ok(Stored::Bare(data)) => Some(data),
            Err(e) => {
                tracing::error!("Error parsing {} from storage: {}", key.as_str(), e);
                None
            }
        }
    }

    /// Persist `value` under `key`. Failures are logged, never returned.
    pub async fn set<T: Serialize>(&self, key: StorageKey, value: &T) {
        let json = match serde_json::to_string(&Envelope {
            version: STORAGE_VERSION,
            data: value,
        }) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Error serializing {} for storage: {}", key.as_str(), e);
                return;
            }
        };

        let now = chrono::Utc::now().timestamp_millis();
        if let Err(e) = sqlx::query(
            "INSERT INTO local_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key.as_str())
        .bind(json)
        .bind(now)
        .execute(self.db.pool())
        .await
        {
            tracing::error!("Error saving {} to storage: {}", key.as_str(), e);
        }
    }
}
