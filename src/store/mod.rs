//! Workout domain store.
//!
//! The store is the only writer of workout data. Every mutation is applied to
//! the in-memory state and written to local storage while the state write lock
//! is held, so readers never observe one without the other.

mod sync;
pub mod types;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{watch, RwLock};

pub use sync::MergeReport;
pub use types::{EntryUpdate, SetUpdate, StoreLifecycle, SyncStatus};

use crate::catalog::{default_exercises, search_exercises};
use crate::db::schema::{
    sanitize_weight, CurrentWorkout, Exercise, GlobalCustomTracker, WorkoutEntry, WorkoutSession,
    WorkoutSet,
};
use crate::db::{LocalStore, StorageKey};
use crate::progress::{
    self, MuscleGroupVolumePoint, ProgressDataPoint, ProgressFilter, ProgressMetric,
    ProgressSummary,
};
use crate::sync::SupabaseClient;

#[derive(Debug, Clone, Default)]
struct StoreState {
    exercises: Vec<Exercise>,
    sessions: Vec<WorkoutSession>,
    draft: CurrentWorkout,
    trackers: Vec<GlobalCustomTracker>,
    /// Sessions deleted locally whose remote rows are not yet removed
    pending_deletions: Vec<String>,
    progress_filter: Option<ProgressFilter>,
}

pub struct WorkoutStore {
    local: LocalStore,
    remote: Arc<SupabaseClient>,
    state: RwLock<StoreState>,
    status: RwLock<SyncStatus>,
    lifecycle: RwLock<StoreLifecycle>,
    syncs_in_flight: AtomicUsize,
    changes: watch::Sender<u64>,
}

/// Newest date first; same-day sessions newest first.
fn sort_sessions(sessions: &mut [WorkoutSession]) {
    sessions.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
}

impl WorkoutStore {
    pub fn new(local: LocalStore, remote: Arc<SupabaseClient>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            local,
            remote,
            state: RwLock::new(StoreState::default()),
            status: RwLock::new(SyncStatus::default()),
            lifecycle: RwLock::new(StoreLifecycle::Uninitialized),
            syncs_in_flight: AtomicUsize::new(0),
            changes,
        }
    }

    /// Load everything from local storage. Seeds the default catalog on first run.
    pub async fn init(&self) {
        *self.lifecycle.write().await = StoreLifecycle::Loading;

        let mut state = self.state.write().await;

        let mut exercises: Vec<Exercise> = self.local.get(StorageKey::Exercises, Vec::new()).await;
        if exercises.is_empty() {
            exercises = default_exercises();
            self.local.set(StorageKey::Exercises, &exercises).await;
        }

        let mut sessions: Vec<WorkoutSession> =
            self.local.get(StorageKey::WorkoutSessions, Vec::new()).await;
        sort_sessions(&mut sessions);

        state.exercises = exercises;
        state.sessions = sessions;
        state.draft = self
            .local
            .get(StorageKey::CurrentWorkoutDraft, CurrentWorkout::empty_for_today())
            .await;
        state.trackers = self.local.get(StorageKey::GlobalCustomTrackers, Vec::new()).await;
        state.pending_deletions = self
            .local
            .get(StorageKey::PendingRemoteDeletions, Vec::new())
            .await;

        tracing::info!(
            "Loaded {} exercises, {} sessions, {} trackers from local storage",
            state.exercises.len(),
            state.sessions.len(),
            state.trackers.len()
        );

        drop(state);
        *self.lifecycle.write().await = StoreLifecycle::Ready;
    }

    pub async fn lifecycle(&self) -> StoreLifecycle {
        *self.lifecycle.read().await
    }

    /// Notified on every catalog, history or tracker change. Draft edits are not included.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Call with the state write lock held so a push snapshot and the counter
    /// it reads always agree.
    async fn record_change(&self) {
        self.status.write().await.pending_changes += 1;
        self.changes.send_modify(|generation| *generation += 1);
    }

    // --- Snapshots ---

    pub async fn exercises(&self) -> Vec<Exercise> {
        self.state.read().await.exercises.clone()
    }

    pub async fn workout_sessions(&self) -> Vec<WorkoutSession> {
        self.state.read().await.sessions.clone()
    }

    pub async fn has_local_history(&self) -> bool {
        !self.state.read().await.sessions.is_empty()
    }

    pub async fn current_workout(&self) -> CurrentWorkout {
        self.state.read().await.draft.clone()
    }

    pub async fn global_trackers(&self) -> Vec<GlobalCustomTracker> {
        self.state.read().await.trackers.clone()
    }

    pub async fn pending_remote_deletions(&self) -> Vec<String> {
        self.state.read().await.pending_deletions.clone()
    }

    pub async fn progress_filter(&self) -> Option<ProgressFilter> {
        self.state.read().await.progress_filter.clone()
    }

    pub async fn sync_status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        status.is_syncing = self.syncs_in_flight.load(Ordering::SeqCst) > 0;
        status
    }

    pub async fn search_exercises(&self, term: &str, muscle_group: Option<&str>) -> Vec<Exercise> {
        let state = self.state.read().await;
        search_exercises(&state.exercises, term, muscle_group)
            .into_iter()
            .cloned()
            .collect()
    }

    // --- Exercise catalog ---

    /// Create a user exercise. `None` when the name or muscle group is blank or
    /// an exercise with the same name already exists.
    pub async fn add_custom_exercise(&self, name: &str, muscle_group: &str) -> Option<Exercise> {
        let name = name.trim();
        let muscle_group = muscle_group.trim();
        if name.is_empty() || muscle_group.is_empty() {
            tracing::debug!("Rejected custom exercise with missing name or muscle group");
            return None;
        }

        let mut state = self.state.write().await;
        let lowered = name.to_lowercase();
        if state.exercises.iter().any(|e| e.name.to_lowercase() == lowered) {
            tracing::debug!("Rejected duplicate custom exercise: {}", name);
            return None;
        }

        let exercise = Exercise {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            muscle_group: muscle_group.to_string(),
            is_default: false,
            is_custom: true,
        };
        state.exercises.push(exercise.clone());
        self.local.set(StorageKey::Exercises, &state.exercises).await;
        self.record_change().await;
        Some(exercise)
    }

    // --- Current workout draft ---

    /// Apply `edit` to the draft and persist it if `edit` reports a change.
    async fn edit_draft<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut CurrentWorkout) -> bool,
    {
        let mut state = self.state.write().await;
        if !edit(&mut state.draft) {
            return false;
        }
        self.local.set(StorageKey::CurrentWorkoutDraft, &state.draft).await;
        true
    }

    async fn edit_entry<F>(&self, entry_index: usize, edit: F) -> bool
    where
        F: FnOnce(&mut WorkoutEntry) -> bool,
    {
        let changed = self
            .edit_draft(|draft| draft.entries.get_mut(entry_index).is_some_and(edit))
            .await;
        if !changed {
            tracing::debug!("Draft entry {} unchanged", entry_index);
        }
        changed
    }

    pub async fn set_current_workout_date(&self, date: NaiveDate) {
        self.edit_draft(|draft| {
            draft.date = date;
            true
        })
        .await;
    }

    /// Append an entry for `exercise_id` with one empty set.
    pub async fn add_exercise_to_workout(&self, exercise_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(exercise) = state.exercises.iter().find(|e| e.id == exercise_id).cloned() else {
            tracing::warn!("Cannot add unknown exercise {} to workout", exercise_id);
            return false;
        };

        state.draft.entries.push(WorkoutEntry::new(&exercise));
        self.local.set(StorageKey::CurrentWorkoutDraft, &state.draft).await;
        true
    }

    pub async fn update_workout_entry(&self, entry_index: usize, update: EntryUpdate) -> bool {
        self.edit_entry(entry_index, |entry| {
            if let Some(sets) = update.sets {
                entry.sets = sets
                    .into_iter()
                    .map(|mut set| {
                        set.weight = sanitize_weight(set.weight);
                        set
                    })
                    .collect();
            }
            if let Some(trackers) = update.custom_trackers {
                entry.custom_trackers = trackers;
            }
            true
        })
        .await
    }

    pub async fn remove_exercise_from_workout(&self, entry_index: usize) -> bool {
        self.edit_draft(|draft| {
            if entry_index >= draft.entries.len() {
                return false;
            }
            draft.entries.remove(entry_index);
            true
        })
        .await
    }

    /// Append an empty set to an entry.
    pub async fn add_set(&self, entry_index: usize) -> bool {
        self.edit_entry(entry_index, |entry| {
            entry.sets.push(WorkoutSet::default());
            true
        })
        .await
    }

    pub async fn remove_set(&self, entry_index: usize, set_index: usize) -> bool {
        self.edit_entry(entry_index, |entry| {
            if set_index >= entry.sets.len() {
                return false;
            }
            entry.sets.remove(set_index);
            true
        })
        .await
    }

    /// Insert a copy of a set directly after it.
    pub async fn duplicate_set(&self, entry_index: usize, set_index: usize) -> bool {
        self.edit_entry(entry_index, |entry| {
            let Some(copy) = entry.sets.get(set_index).cloned() else {
                return false;
            };
            entry.sets.insert(set_index + 1, copy);
            true
        })
        .await
    }

    pub async fn update_set(
        &self,
        entry_index: usize,
        set_index: usize,
        update: SetUpdate,
    ) -> bool {
        self.edit_entry(entry_index, |entry| {
            let Some(set) = entry.sets.get_mut(set_index) else {
                return false;
            };
            match update {
                SetUpdate::Weight(weight) => set.weight = sanitize_weight(weight),
                SetUpdate::Reps(reps) => set.reps = reps,
                SetUpdate::CustomValue { tracker, value } => {
                    set.custom_values.insert(tracker, value);
                }
                SetUpdate::ClearCustomValue { tracker } => {
                    set.custom_values.remove(&tracker);
                }
            }
            true
        })
        .await
    }

    /// Set a legacy per-entry tracker value.
    pub async fn set_entry_tracker(&self, entry_index: usize, name: &str, value: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.edit_entry(entry_index, |entry| {
            entry.custom_trackers.insert(name.to_string(), value.to_string());
            true
        })
        .await
    }

    pub async fn remove_entry_tracker(&self, entry_index: usize, name: &str) -> bool {
        self.edit_entry(entry_index, |entry| entry.custom_trackers.remove(name).is_some())
            .await
    }

    pub async fn clear_current_workout(&self) {
        self.edit_draft(|draft| {
            *draft = CurrentWorkout::empty_for_today();
            true
        })
        .await;
    }

    /// Turn the draft into a saved session.
    ///
    /// Returns `false` without touching history when the draft has no entries
    /// or one of its entries has no sets.
    pub async fn save_workout(&self) -> bool {
        let mut state = self.state.write().await;

        if state.draft.entries.is_empty() {
            tracing::debug!("Refusing to save a workout with no exercises");
            return false;
        }
        if state.draft.entries.iter().any(|e| e.sets.is_empty()) {
            tracing::debug!("Refusing to save a workout with an exercise that has no sets");
            return false;
        }

        let draft = std::mem::replace(&mut state.draft, CurrentWorkout::empty_for_today());
        let session = WorkoutSession {
            id: uuid::Uuid::new_v4().to_string(),
            date: draft.date,
            entries: draft.entries,
            created_at: chrono::Utc::now(),
        };
        tracing::info!("Saved workout {} for {}", session.id, session.date);

        state.sessions.push(session);
        sort_sessions(&mut state.sessions);

        self.local.set(StorageKey::WorkoutSessions, &state.sessions).await;
        self.local.set(StorageKey::CurrentWorkoutDraft, &state.draft).await;
        self.record_change().await;
        true
    }

    // --- History ---

    /// Remove a session locally and queue its remote rows for deletion.
    pub async fn delete_workout_session(&self, session_id: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.id != session_id);
        if state.sessions.len() == before {
            return false;
        }

        if !state.pending_deletions.iter().any(|id| id == session_id) {
            state.pending_deletions.push(session_id.to_string());
        }
        self.local.set(StorageKey::WorkoutSessions, &state.sessions).await;
        self.local.set(StorageKey::PendingRemoteDeletions, &state.pending_deletions).await;
        self.record_change().await;
        drop(state);

        tracing::info!("Deleted workout session {}", session_id);
        true
    }

    // --- Global trackers ---

    /// Add a tracker definition. A name that already exists is left as is.
    pub async fn add_global_tracker(&self, name: &str, unit: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        let mut state = self.state.write().await;
        if state.trackers.iter().any(|t| t.name == name) {
            return false;
        }

        state.trackers.push(GlobalCustomTracker {
            name: name.to_string(),
            unit: unit.trim().to_string(),
        });
        self.local.set(StorageKey::GlobalCustomTrackers, &state.trackers).await;
        self.record_change().await;
        true
    }

    /// Wipe local data back to a fresh install. The device id survives.
    pub async fn reset_local_data(&self) {
        let mut state = self.state.write().await;
        *state = StoreState {
            exercises: default_exercises(),
            draft: CurrentWorkout::empty_for_today(),
            ..StoreState::default()
        };

        self.local.set(StorageKey::Exercises, &state.exercises).await;
        self.local.set(StorageKey::WorkoutSessions, &state.sessions).await;
        self.local.set(StorageKey::CurrentWorkoutDraft, &state.draft).await;
        self.local.set(StorageKey::GlobalCustomTrackers, &state.trackers).await;
        self.local.set(StorageKey::PendingRemoteDeletions, &state.pending_deletions).await;
        self.record_change().await;
        drop(state);

        tracing::warn!("Local workout data reset");
    }

    // --- Progress ---

    pub async fn set_progress_filter(&self, filter: Option<ProgressFilter>) {
        self.state.write().await.progress_filter = filter;
    }

    /// Series for the active filter; empty when no filter is set.
    pub async fn calculate_progress_data(&self) -> Vec<ProgressDataPoint> {
        let state = self.state.read().await;
        match &state.progress_filter {
            Some(filter) => progress::calculate_progress_data(&state.sessions, filter),
            None => Vec::new(),
        }
    }

    pub async fn calculate_muscle_group_volume_data(&self) -> Vec<MuscleGroupVolumePoint> {
        progress::calculate_muscle_group_volume_data(&self.state.read().await.sessions)
    }

    pub async fn progress_summary(&self, metric: ProgressMetric) -> Option<ProgressSummary> {
        progress::summarize(&self.calculate_progress_data().await, metric)
    }
}
