use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub muscle_group: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_custom: bool,
}

impl Exercise {
    /// Stand-in for an exercise id that no catalog knows about.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Unknown".to_string(),
            muscle_group: "Unknown".to_string(),
            is_default: false,
            is_custom: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub weight: f64,
    pub reps: u32,
    /// Values for global trackers, keyed by tracker name
    #[serde(default)]
    pub custom_values: BTreeMap<String, String>,
}

impl WorkoutSet {
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight: sanitize_weight(weight),
            reps,
            custom_values: BTreeMap::new(),
        }
    }

    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }
}

impl Default for WorkoutSet {
    fn default() -> Self {
        Self::new(0.0, 0)
    }
}

/// Weights are never negative; NaN and infinities collapse to zero.
pub fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    pub id: String,
    pub exercise_id: String,
    /// Snapshot taken when the exercise was added; may go stale
    pub exercise: Exercise,
    pub sets: Vec<WorkoutSet>,
    /// Legacy per-entry trackers
    #[serde(default)]
    pub custom_trackers: BTreeMap<String, String>,
}

impl WorkoutEntry {
    pub fn new(exercise: &Exercise) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            exercise_id: exercise.id.clone(),
            exercise: exercise.clone(),
            sets: vec![WorkoutSet::default()],
            custom_trackers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub date: NaiveDate,
    pub entries: Vec<WorkoutEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWorkout {
    pub date: NaiveDate,
    pub entries: Vec<WorkoutEntry>,
}

impl CurrentWorkout {
    pub fn empty_for_today() -> Self {
        Self {
            date: today(),
            entries: Vec::new(),
        }
    }
}

impl Default for CurrentWorkout {
    fn default() -> Self {
        Self::empty_for_today()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCustomTracker {
    pub name: String,
    pub unit: String,
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
