//! Progress aggregation over session history.
//!
//! Everything here is a pure function of the sessions passed in. History is
//! stored newest-first; every series returned here is oldest-first.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::MUSCLE_GROUPS;
use crate::db::schema::{Exercise, WorkoutEntry, WorkoutSession};

/// Which entries a progress series is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProgressFilter {
    Exercise(String),
    MuscleGroup(String),
}

impl ProgressFilter {
    pub fn matches(&self, entry: &WorkoutEntry) -> bool {
        match self {
            Self::Exercise(id) => entry.exercise_id == *id,
            Self::MuscleGroup(group) => entry.exercise.muscle_group == *group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDataPoint {
    pub date: NaiveDate,
    pub volume_load: f64,
    pub max_weight: f64,
    pub estimated_1rm: f64,
    pub total_reps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMetric {
    VolumeLoad,
    MaxWeight,
    #[serde(rename = "estimated_1rm")]
    Estimated1Rm,
    TotalReps,
}

impl ProgressMetric {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VolumeLoad => "Volume Load",
            Self::MaxWeight => "Max Weight",
            Self::Estimated1Rm => "Estimated 1RM",
            Self::TotalReps => "Total Reps",
        }
    }

    pub fn value(&self, point: &ProgressDataPoint) -> f64 {
        match self {
            Self::VolumeLoad => point.volume_load,
            Self::MaxWeight => point.max_weight,
            Self::Estimated1Rm => point.estimated_1rm,
            Self::TotalReps => point.total_reps as f64,
        }
    }
}

/// Epley estimate of the one-repetition maximum.
pub fn epley_1rm(weight: f64, reps: u32) -> f64 {
    weight * (1.0 + reps as f64 / 30.0)
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One point per session containing at least one matching entry.
pub fn calculate_progress_data(
    sessions: &[WorkoutSession],
    filter: &ProgressFilter,
) -> Vec<ProgressDataPoint> {
    let mut points: Vec<ProgressDataPoint> = sessions
        .iter()
        .filter(|session| session.entries.iter().any(|e| filter.matches(e)))
        .map(|session| {
            let mut point = ProgressDataPoint {
                date: session.date,
                volume_load: 0.0,
                max_weight: 0.0,
                estimated_1rm: 0.0,
                total_reps: 0,
            };

            let sets = session
                .entries
                .iter()
                .filter(|e| filter.matches(e))
                .flat_map(|e| e.sets.iter());

            for set in sets {
                point.volume_load += set.volume();
                point.max_weight = point.max_weight.max(set.weight);
                point.estimated_1rm = point.estimated_1rm.max(epley_1rm(set.weight, set.reps));
                point.total_reps += set.reps;
            }

            point.estimated_1rm = round_to_tenth(point.estimated_1rm);
            point
        })
        .collect();

    points.reverse();
    points
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub current: f64,
    /// Percent change from the previous point; 0 without a usable baseline
    pub improvement_pct: f64,
    pub total_sessions: usize,
}

/// Latest value and change from the point before it.
pub fn summarize(points: &[ProgressDataPoint], metric: ProgressMetric) -> Option<ProgressSummary> {
    let latest = points.last()?;
    let current = metric.value(latest);

    let improvement_pct = match points.len().checked_sub(2).map(|i| metric.value(&points[i])) {
        Some(previous) if previous != 0.0 => (current - previous) / previous * 100.0,
        _ => 0.0,
    };

    Some(ProgressSummary {
        current,
        improvement_pct,
        total_sessions: points.len(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sets: usize,
    pub total_reps: u32,
    pub total_volume: f64,
}

pub fn session_stats(session: &WorkoutSession) -> SessionStats {
    session
        .entries
        .iter()
        .flat_map(|e| e.sets.iter())
        .fold(SessionStats::default(), |mut stats, set| {
            stats.total_sets += 1;
            stats.total_reps += set.reps;
            stats.total_volume += set.volume();
            stats
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleGroupVolumePoint {
    pub date: NaiveDate,
    pub volumes: BTreeMap<String, f64>,
}

/// Volume bucket for an exercise.
///
/// "Arms" is split by name: this is a heuristic and misfiles exercises whose
/// names do not follow the usual wording. Unmatched arm work stays in "Arms".
pub fn volume_bucket(exercise: &Exercise) -> String {
    if exercise.muscle_group != "Arms" {
        return exercise.muscle_group.clone();
    }

    let name = exercise.name.to_lowercase();
    if name.contains("bicep") || name.contains("curl") {
        "Biceps".to_string()
    } else if name.contains("tricep") || name.contains("extension") || name.contains("close grip") {
        "Triceps".to_string()
    } else {
        "Arms".to_string()
    }
}

/// Per-session volume load split by muscle group, oldest session first.
pub fn calculate_muscle_group_volume_data(
    sessions: &[WorkoutSession],
) -> Vec<MuscleGroupVolumePoint> {
    sessions
        .iter()
        .rev()
        .map(|session| {
            let mut volumes: BTreeMap<String, f64> =
                MUSCLE_GROUPS.iter().map(|g| (g.to_string(), 0.0)).collect();

            for entry in &session.entries {
                let volume: f64 = entry.sets.iter().map(|s| s.volume()).sum();
                *volumes.entry(volume_bucket(&entry.exercise)).or_insert(0.0) += volume;
            }

            MuscleGroupVolumePoint {
                date: session.date,
                volumes,
            }
        })
        .collect()
}
