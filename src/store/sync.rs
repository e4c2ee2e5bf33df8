//! Push and pull between the store and the remote backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{sort_sessions, SyncStatus, WorkoutStore};
use crate::db::schema::{Exercise, GlobalCustomTracker, WorkoutSession};
use crate::db::StorageKey;
use crate::sync::SupabaseError;

/// Counts a sync as in flight for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State a push works from, plus the pending-change count it accounts for.
struct PushSnapshot {
    exercises: Vec<Exercise>,
    trackers: Vec<GlobalCustomTracker>,
    sessions: Vec<WorkoutSession>,
    deletions: Vec<String>,
    covered_changes: u32,
}

/// Result of pulling remote data into local state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub exercises_added: usize,
    pub trackers_added: usize,
    pub sessions_added: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.exercises_added == 0 && self.trackers_added == 0 && self.sessions_added == 0
    }
}

/// Append remote exercises whose id and name are both new locally.
pub(crate) fn merge_exercises(local: &mut Vec<Exercise>, remote: Vec<Exercise>) -> usize {
    let mut ids: HashSet<String> = local.iter().map(|e| e.id.clone()).collect();
    let mut names: HashSet<String> = local.iter().map(|e| e.name.to_lowercase()).collect();

    let before = local.len();
    for exercise in remote {
        if ids.contains(&exercise.id) || names.contains(&exercise.name.to_lowercase()) {
            continue;
        }
        ids.insert(exercise.id.clone());
        names.insert(exercise.name.to_lowercase());
        local.push(exercise);
    }
    local.len() - before
}

/// Append remote trackers with unseen names. Local units win.
pub(crate) fn merge_trackers(
    local: &mut Vec<GlobalCustomTracker>,
    remote: Vec<GlobalCustomTracker>,
) -> usize {
    let before = local.len();
    for tracker in remote {
        if !local.iter().any(|t| t.name == tracker.name) {
            local.push(tracker);
        }
    }
    local.len() - before
}

/// Append remote sessions missing locally, skipping ids awaiting remote deletion.
pub(crate) fn merge_sessions(
    local: &mut Vec<WorkoutSession>,
    remote: Vec<WorkoutSession>,
    pending_deletions: &[String],
) -> usize {
    let mut seen: HashSet<String> = local.iter().map(|s| s.id.clone()).collect();
    seen.extend(pending_deletions.iter().cloned());

    let before = local.len();
    for session in remote {
        if seen.insert(session.id.clone()) {
            local.push(session);
        }
    }
    let added = local.len() - before;
    if added > 0 {
        sort_sessions(local);
    }
    added
}

impl WorkoutStore {
    pub fn remote(&self) -> &crate::sync::SupabaseClient {
        &self.remote
    }

    pub async fn set_sync_status(&self, status: SyncStatus) {
        *self.status.write().await = status;
    }

    /// Record an unreachable backend.
    pub async fn mark_offline(&self, message: impl Into<String>) {
        let mut status = self.status.write().await;
        status.is_online = false;
        status.sync_error = Some(message.into());
    }

    pub async fn clear_sync_error(&self) {
        self.status.write().await.sync_error = None;
    }

    /// Mutations bump the counter under the state write lock, so reading it
    /// under the read lock matches the cloned state exactly.
    async fn push_snapshot(&self) -> PushSnapshot {
        let state = self.state.read().await;
        PushSnapshot {
            exercises: state.exercises.clone(),
            trackers: state.trackers.clone(),
            sessions: state.sessions.clone(),
            deletions: state.pending_deletions.clone(),
            covered_changes: self.status.read().await.pending_changes,
        }
    }

    async fn record_sync_success(&self, covered_changes: u32) {
        let mut status = self.status.write().await;
        status.is_online = true;
        status.last_sync = Some(chrono::Utc::now());
        status.sync_error = None;
        status.pending_changes = status.pending_changes.saturating_sub(covered_changes);
    }

    async fn record_sync_failure(&self, error: &SupabaseError) {
        let mut status = self.status.write().await;
        if matches!(error, SupabaseError::Http(_) | SupabaseError::Offline) {
            status.is_online = false;
        }
        status.sync_error = Some(error.to_string());
    }

    /// Push local state to the backend.
    ///
    /// Works on a snapshot taken under the read lock, so edits made during the
    /// push are picked up by the next one. Exercises go first, then trackers,
    /// sessions and queued deletions.
    pub async fn sync_to_remote(&self) -> Result<(), SupabaseError> {
        let _in_flight = InFlight::enter(&self.syncs_in_flight);

        let PushSnapshot {
            exercises,
            trackers,
            sessions,
            deletions,
            covered_changes,
        } = self.push_snapshot().await;

        tracing::info!(
            "Pushing {} sessions and {} queued deletions",
            sessions.len(),
            deletions.len()
        );

        let mut flushed = Vec::new();
        let result: Result<(), SupabaseError> = async {
            self.remote.sync_custom_exercises(&exercises).await?;
            self.remote.sync_custom_trackers(&trackers).await?;
            self.remote.sync_workout_sessions(&sessions).await?;
            for id in &deletions {
                self.remote.delete_workout_session(id).await?;
                flushed.push(id.clone());
            }
            Ok(())
        }
        .await;

        if !flushed.is_empty() {
            let mut state = self.state.write().await;
            state.pending_deletions.retain(|id| !flushed.contains(id));
            self.local
                .set(StorageKey::PendingRemoteDeletions, &state.pending_deletions)
                .await;
        }

        match &result {
            Ok(()) => {
                self.record_sync_success(covered_changes).await;
                tracing::info!("Push completed");
            }
            Err(e) => {
                tracing::error!("Push failed: {}", e);
                self.record_sync_failure(e).await;
            }
        }
        result
    }

    /// Pull remote data and merge it into local state.
    ///
    /// Local records win on id or name clashes. Pulled data does not count as
    /// a pending change.
    pub async fn load_from_remote(&self) -> Result<MergeReport, SupabaseError> {
        let _in_flight = InFlight::enter(&self.syncs_in_flight);

        if !self.remote.check_connectivity().await {
            let error = SupabaseError::Offline;
            tracing::warn!("Pull skipped: {}", error);
            self.record_sync_failure(&error).await;
            return Err(error);
        }

        let remote_exercises = self.remote.load_custom_exercises().await;
        let remote_trackers = self.remote.load_custom_trackers().await;
        let remote_sessions = self.remote.load_workout_sessions().await;

        let mut state = self.state.write().await;
        let state = &mut *state;
        let report = MergeReport {
            exercises_added: merge_exercises(&mut state.exercises, remote_exercises),
            trackers_added: merge_trackers(&mut state.trackers, remote_trackers),
            sessions_added: merge_sessions(
                &mut state.sessions,
                remote_sessions,
                &state.pending_deletions,
            ),
        };

        if report.exercises_added > 0 {
            self.local.set(StorageKey::Exercises, &state.exercises).await;
        }
        if report.trackers_added > 0 {
            self.local.set(StorageKey::GlobalCustomTrackers, &state.trackers).await;
        }
        if report.sessions_added > 0 {
            self.local.set(StorageKey::WorkoutSessions, &state.sessions).await;
        }

        tracing::info!(
            "Pulled {} exercises, {} trackers, {} sessions from remote",
            report.exercises_added,
            report.trackers_added,
            report.sessions_added
        );

        self.record_sync_success(0).await;
        Ok(report)
    }
}
