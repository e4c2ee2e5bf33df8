//! PostgREST client for the hosted workout backend.
//!
//! Every row is scoped to this device. Write operations fail fast and return
//! `SupabaseError`; read operations log failures and return an empty result.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use super::types::{
    DeviceRegistryRow, EntryRow, ExerciseRecord, SessionRecord, SessionRow, SupabaseError,
    TrackerRow, UserExerciseRow, TABLE_DEVICE_REGISTRY, TABLE_EXERCISE_LIBRARY,
    TABLE_USER_CUSTOM_TRACKERS, TABLE_USER_EXERCISES, TABLE_WORKOUT_ENTRIES,
    TABLE_WORKOUT_SESSIONS,
};
use crate::catalog::default_exercises;
use crate::db::schema::{Exercise, GlobalCustomTracker, WorkoutEntry, WorkoutSession};

const REST_PATH: &str = "rest/v1";

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    device_id: String,
    /// Tracker sync is delete-then-insert and must never interleave with itself
    tracker_sync: Mutex<()>,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            device_id: device_id.into(),
            tracker_sync: Mutex::new(()),
        }
    }

    /// Apply a per-request timeout to every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Client::builder().timeout(timeout).build() {
            Ok(http) => self.http = http,
            Err(e) => {
                tracing::warn!("Failed to build HTTP client with timeout, using default: {}", e)
            }
        }
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}/{}", self.base_url, REST_PATH, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn device_filter(&self) -> (&'static str, String) {
        ("device_id", format!("eq.{}", self.device_id))
    }

    async fn check(response: Response) -> Result<Response, SupabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SupabaseError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        rows: &T,
    ) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        rows: &T,
    ) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete_where(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::DELETE, table)
            .query(filters)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, SupabaseError> {
        let response = self.request(Method::GET, table).query(query).send().await?;
        let response = Self::check(response).await?;

        Ok(response.json().await?)
    }

    /// Upsert user-created exercises keyed by id. Safe to repeat.
    ///
    /// Fails fast on the first backend error.
    pub async fn sync_custom_exercises(
        &self,
        exercises: &[Exercise],
    ) -> Result<(), SupabaseError> {
        let now = Utc::now();
        let rows: Vec<UserExerciseRow> = exercises
            .iter()
            .filter(|e| e.is_custom)
            .map(|e| UserExerciseRow {
                id: &e.id,
                device_id: &self.device_id,
                name: &e.name,
                muscle_group: &e.muscle_group,
                updated_at: now,
            })
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        self.upsert(TABLE_USER_EXERCISES, "id", &rows).await.inspect_err(|e| {
            tracing::error!("Error syncing exercises: {}", e);
        })?;

        tracing::debug!("Synced {} custom exercises", rows.len());
        Ok(())
    }

    /// Custom exercises owned by this device. Empty on any error.
    pub async fn load_custom_exercises(&self) -> Vec<Exercise> {
        let query = [("select", "*".to_string()), self.device_filter()];
        match self.select::<ExerciseRecord>(TABLE_USER_EXERCISES, &query).await {
            Ok(rows) => rows.into_iter().map(ExerciseRecord::into_custom_exercise).collect(),
            Err(e) => {
                tracing::error!("Error loading exercises: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace every tracker row of this device with `trackers`.
    ///
    /// Not transactional: if the insert fails after the delete, the device has
    /// no remote trackers until the next successful call.
    pub async fn sync_custom_trackers(
        &self,
        trackers: &[GlobalCustomTracker],
    ) -> Result<(), SupabaseError> {
        let _guard = self.tracker_sync.lock().await;

        self.delete_where(TABLE_USER_CUSTOM_TRACKERS, &[self.device_filter()])
            .await
            .inspect_err(|e| tracing::error!("Error clearing trackers: {}", e))?;

        if trackers.is_empty() {
            return Ok(());
        }

        let rows: Vec<TrackerRow> = trackers
            .iter()
            .map(|t| TrackerRow {
                device_id: &self.device_id,
                name: &t.name,
                unit: &t.unit,
            })
            .collect();

        self.insert(TABLE_USER_CUSTOM_TRACKERS, &rows)
            .await
            .inspect_err(|e| tracing::error!("Error syncing trackers: {}", e))?;

        tracing::debug!("Synced {} custom trackers", rows.len());
        Ok(())
    }

    /// Tracker definitions owned by this device. Empty on any error.
    pub async fn load_custom_trackers(&self) -> Vec<GlobalCustomTracker> {
        let query = [("select", "name,unit".to_string()), self.device_filter()];
        match self.select::<GlobalCustomTracker>(TABLE_USER_CUSTOM_TRACKERS, &query).await {
            Ok(trackers) => trackers,
            Err(e) => {
                tracing::error!("Error loading trackers: {}", e);
                Vec::new()
            }
        }
    }

    /// Upsert each session row followed by its entry rows.
    ///
    /// Stops at the first failure. Rows written before the failure stay
    /// written; there is no rollback. Entry `created_at` carries the entry's
    /// position so the order survives a round trip.
    pub async fn sync_workout_sessions(
        &self,
        sessions: &[WorkoutSession],
    ) -> Result<(), SupabaseError> {
        let now = Utc::now();

        for session in sessions {
            let row = SessionRow {
                id: &session.id,
                device_id: &self.device_id,
                date: session.date,
                created_at: session.created_at,
                updated_at: now,
            };

            self.upsert(TABLE_WORKOUT_SESSIONS, "id", &[row])
                .await
                .inspect_err(|e| tracing::error!("Error syncing session {}: {}", session.id, e))?;

            if session.entries.is_empty() {
                continue;
            }

            let entries: Vec<EntryRow> = session
                .entries
                .iter()
                .enumerate()
                .map(|(i, entry)| EntryRow {
                    id: &entry.id,
                    session_id: &session.id,
                    exercise_id: &entry.exercise_id,
                    sets: &entry.sets,
                    custom_trackers: &entry.custom_trackers,
                    created_at: entry_timestamp(session, i),
                })
                .collect();

            self.upsert(TABLE_WORKOUT_ENTRIES, "id", &entries)
                .await
                .inspect_err(|e| {
                    tracing::error!("Error syncing entries for {}: {}", session.id, e)
                })?;
        }

        tracing::debug!("Synced {} workout sessions", sessions.len());
        Ok(())
    }

    /// Sessions of this device, newest first, with exercises resolved.
    ///
    /// Empty on any error fetching sessions. A session row that does not parse
    /// is skipped; an unknown exercise id becomes the "Unknown" placeholder.
    pub async fn load_workout_sessions(&self) -> Vec<WorkoutSession> {
        let query = [
            ("select", "*,workout_entries(*)".to_string()),
            self.device_filter(),
            ("order", "date.desc".to_string()),
        ];

        let raw = match self.select::<serde_json::Value>(TABLE_WORKOUT_SESSIONS, &query).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Error loading sessions: {}", e);
                return Vec::new();
            }
        };

        let records: Vec<SessionRecord> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable session row: {}", e);
                    None
                }
            })
            .collect();

        let mut known = match self
            .select::<ExerciseRecord>(TABLE_EXERCISE_LIBRARY, &[("select", "*".to_string())])
            .await
        {
            Ok(rows) => rows.into_iter().map(ExerciseRecord::into_library_exercise).collect(),
            Err(e) => {
                tracing::warn!("Exercise library unavailable: {}", e);
                Vec::new()
            }
        };
        known.extend(self.load_custom_exercises().await);

        resolve_sessions(records, &known)
    }

    /// Remove a session's entry rows and then the session row.
    pub async fn delete_workout_session(&self, session_id: &str) -> Result<(), SupabaseError> {
        self.delete_where(
            TABLE_WORKOUT_ENTRIES,
            &[("session_id", format!("eq.{}", session_id))],
        )
        .await?;

        self.delete_where(
            TABLE_WORKOUT_SESSIONS,
            &[("id", format!("eq.{}", session_id)), self.device_filter()],
        )
        .await?;

        tracing::debug!("Deleted remote session {}", session_id);
        Ok(())
    }

    /// Cheap read against the registry. Any failure means "not connected".
    pub async fn check_connectivity(&self) -> bool {
        let query = [("select", "device_id".to_string()), ("limit", "1".to_string())];
        match self.select::<serde_json::Value>(TABLE_DEVICE_REGISTRY, &query).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connectivity check failed: {}", e);
                false
            }
        }
    }

    /// Best-effort heartbeat. Failures are only logged.
    pub async fn register_device(&self) {
        let row = DeviceRegistryRow {
            device_id: &self.device_id,
            last_active: Utc::now(),
        };

        if let Err(e) = self.upsert(TABLE_DEVICE_REGISTRY, "device_id", &[row]).await {
            tracing::error!("Error registering device: {}", e);
        }
    }
}

/// Upload timestamp of the entry at `index`, strictly increasing within a session.
fn entry_timestamp(session: &WorkoutSession, index: usize) -> DateTime<Utc> {
    session.created_at + chrono::Duration::milliseconds(index as i64)
}

/// Turn raw session records into domain sessions.
///
/// Exercise references are looked up in `known` first and the built-in
/// catalog second. Embedded entries come back in no guaranteed order and are
/// sorted by `created_at`; entries without one keep their received order.
pub(crate) fn resolve_sessions(
    records: Vec<SessionRecord>,
    known: &[Exercise],
) -> Vec<WorkoutSession> {
    let defaults = default_exercises();
    let mut lookup: HashMap<&str, &Exercise> =
        defaults.iter().map(|e| (e.id.as_str(), e)).collect();
    lookup.extend(known.iter().map(|e| (e.id.as_str(), e)));

    records
        .into_iter()
        .map(|mut record| {
            record.workout_entries.sort_by_key(|entry| entry.created_at);
            record
        })
        .map(|record| WorkoutSession {
            id: record.id,
            date: record.date,
            created_at: record.created_at,
            entries: record
                .workout_entries
                .into_iter()
                .map(|entry| {
                    let exercise = lookup
                        .get(entry.exercise_id.as_str())
                        .map(|e| (*e).clone())
                        .unwrap_or_else(|| Exercise::unknown(&entry.exercise_id));

                    WorkoutEntry {
                        id: entry.id,
                        exercise_id: entry.exercise_id,
                        exercise,
                        sets: entry.sets,
                        custom_trackers: entry.custom_trackers.unwrap_or_default(),
                    }
                })
                .collect(),
        })
        .collect()
}
