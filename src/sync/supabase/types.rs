//! Remote row types and error definitions

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::schema::{Exercise, WorkoutSet};

pub const TABLE_DEVICE_REGISTRY: &str = "device_registry";
pub const TABLE_EXERCISE_LIBRARY: &str = "exercise_library";
pub const TABLE_USER_EXERCISES: &str = "user_exercises";
pub const TABLE_USER_CUSTOM_TRACKERS: &str = "user_custom_trackers";
pub const TABLE_WORKOUT_SESSIONS: &str = "workout_sessions";
pub const TABLE_WORKOUT_ENTRIES: &str = "workout_entries";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Remote store is unreachable")]
    Offline,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceRegistryRow<'a> {
    pub device_id: &'a str,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserExerciseRow<'a> {
    pub id: &'a str,
    pub device_id: &'a str,
    pub name: &'a str,
    pub muscle_group: &'a str,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TrackerRow<'a> {
    pub device_id: &'a str,
    pub name: &'a str,
    pub unit: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionRow<'a> {
    pub id: &'a str,
    pub device_id: &'a str,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EntryRow<'a> {
    pub id: &'a str,
    pub session_id: &'a str,
    pub exercise_id: &'a str,
    pub sets: &'a [WorkoutSet],
    pub custom_trackers: &'a BTreeMap<String, String>,
    /// Session time plus the entry's index in milliseconds; orders entries on load
    pub created_at: DateTime<Utc>,
}

/// Exercise row from either `exercise_library` or `user_exercises`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExerciseRecord {
    pub id: String,
    pub name: String,
    pub muscle_group: String,
    #[serde(default)]
    pub is_default: Option<bool>,
}

impl ExerciseRecord {
    pub fn into_library_exercise(self) -> Exercise {
        Exercise {
            id: self.id,
            name: self.name,
            muscle_group: self.muscle_group,
            is_default: self.is_default.unwrap_or(false),
            is_custom: false,
        }
    }

    pub fn into_custom_exercise(self) -> Exercise {
        Exercise {
            id: self.id,
            name: self.name,
            muscle_group: self.muscle_group,
            is_default: false,
            is_custom: true,
        }
    }
}

/// Session row with its embedded `workout_entries`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionRecord {
    pub id: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub workout_entries: Vec<EntryRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EntryRecord {
    pub id: String,
    pub exercise_id: String,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    #[serde(default)]
    pub custom_trackers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
