use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::SupabaseError;
use crate::store::{MergeReport, WorkoutStore};

pub const UNSAVED_DATA_WARNING: &str =
    "You have unsaved workout data. Are you sure you want to leave?";
pub const OFFLINE_MESSAGE: &str = "No internet connection";

/// What to do at startup when this device already has local history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupPolicy {
    /// Push local state and never pull
    LocalWins,
    /// Pull and merge remote state, then push
    #[default]
    Merge,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown startup policy: {0}")]
pub struct UnknownStartupPolicy(pub String);

impl FromStr for StartupPolicy {
    type Err = UnknownStartupPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "local_wins" | "local-wins" => Ok(Self::LocalWins),
            other => Err(UnknownStartupPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Offline,
    /// Fresh device: remote history was pulled
    Pulled(MergeReport),
    Pushed,
    Merged(MergeReport),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadDecision {
    Leave,
    /// The final push failed; the user should be asked before leaving
    ConfirmLeave(String),
}

pub struct BackgroundSyncService {
    store: Arc<WorkoutStore>,
    debounce: Duration,
    policy: StartupPolicy,
    is_running: Arc<Mutex<bool>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    pending_push: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BackgroundSyncService {
    pub fn new(store: Arc<WorkoutStore>, debounce: Duration, policy: StartupPolicy) -> Self {
        Self {
            store,
            debounce,
            policy,
            is_running: Arc::new(Mutex::new(false)),
            listener: Mutex::new(None),
            pending_push: Arc::new(Mutex::new(None)),
        }
    }

    /// Start listening for store changes and pushing them after the debounce
    pub async fn start(&self) {
        let mut is_running = self.is_running.lock().await;
        if *is_running {
            return;
        }
        *is_running = true;
        drop(is_running);

        let mut changes = self.store.subscribe_changes();
        changes.borrow_and_update();

        let store = self.store.clone();
        let pending = self.pending_push.clone();
        let debounce = self.debounce;
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                if !*is_running.lock().await {
                    break;
                }
                Self::schedule_push(store.clone(), pending.clone(), debounce).await;
            }
        });

        *self.listener.lock().await = Some(handle);
        tracing::info!("Background sync started ({}s debounce)", self.debounce.as_secs_f64());
    }

    /// Stop the change listener and drop any push that has not started yet
    pub async fn stop(&self) {
        *self.is_running.lock().await = false;

        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.pending_push.lock().await.take() {
            handle.abort();
        }
        tracing::info!("Background sync stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.lock().await
    }

    /// Replace the waiting timer with a fresh one.
    ///
    /// The push itself runs in its own task, so aborting the timer never
    /// interrupts a push that already started.
    async fn schedule_push(
        store: Arc<WorkoutStore>,
        pending: Arc<Mutex<Option<JoinHandle<()>>>>,
        debounce: Duration,
    ) {
        let mut slot = pending.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            tokio::spawn(async move {
                let _ = Self::run_push(&store, "debounced").await;
            });
        }));
    }

    async fn run_push(store: &WorkoutStore, reason: &str) -> Result<(), SupabaseError> {
        let start = Instant::now();
        let result = store.sync_to_remote().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::info!("Sync ({}) completed in {}ms", reason, duration_ms),
            Err(e) => tracing::error!("Sync ({}) failed after {}ms: {}", reason, duration_ms, e),
        }
        result
    }

    /// The app went to the background.
    pub async fn on_page_hidden(&self) {
        let _ = Self::run_push(&self.store, "page hidden").await;
    }

    /// The app is closing. Asks for confirmation when the final push fails.
    pub async fn on_unload(&self) -> UnloadDecision {
        match Self::run_push(&self.store, "unload").await {
            Ok(()) => UnloadDecision::Leave,
            Err(_) => UnloadDecision::ConfirmLeave(UNSAVED_DATA_WARNING.to_string()),
        }
    }

    /// User-requested sync. Clears the previous error first.
    pub async fn manual_sync(&self) -> Result<(), SupabaseError> {
        self.store.clear_sync_error().await;
        Self::run_push(&self.store, "manual").await
    }

    /// Reconcile with the backend once at startup.
    pub async fn run_startup_reconciliation(&self) -> StartupOutcome {
        let remote = self.store.remote();
        remote.register_device().await;

        if !remote.check_connectivity().await {
            tracing::warn!("Backend unreachable at startup, working offline");
            self.store.mark_offline(OFFLINE_MESSAGE).await;
            return StartupOutcome::Offline;
        }

        let mut status = self.store.sync_status().await;
        status.is_online = true;
        self.store.set_sync_status(status).await;

        if !self.store.has_local_history().await {
            tracing::info!("No local history, pulling from remote");
            return match self.store.load_from_remote().await {
                Ok(report) => StartupOutcome::Pulled(report),
                Err(e) => StartupOutcome::Failed(e.to_string()),
            };
        }

        match self.policy {
            StartupPolicy::LocalWins => match Self::run_push(&self.store, "startup").await {
                Ok(()) => StartupOutcome::Pushed,
                Err(e) => StartupOutcome::Failed(e.to_string()),
            },
            StartupPolicy::Merge => {
                let report = match self.store.load_from_remote().await {
                    Ok(report) => report,
                    Err(e) => return StartupOutcome::Failed(e.to_string()),
                };
                match Self::run_push(&self.store, "startup").await {
                    Ok(()) => StartupOutcome::Merged(report),
                    Err(e) => StartupOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LocalStore};
    use crate::sync::SupabaseClient;

    async fn offline_service(policy: StartupPolicy) -> (BackgroundSyncService, Arc<WorkoutStore>) {
        let local = LocalStore::new(Arc::new(Database::in_memory().await.unwrap()));
        let remote = Arc::new(
            SupabaseClient::new("http://127.0.0.1:9", "key", "device_test")
                .with_timeout(Duration::from_millis(500)),
        );
        let store = Arc::new(WorkoutStore::new(local, remote));
        store.init().await;
        (BackgroundSyncService::new(store.clone(), Duration::from_millis(50), policy), store)
    }

    #[test]
    fn test_startup_policy_parsing() {
        assert_eq!("merge".parse::<StartupPolicy>(), Ok(StartupPolicy::Merge));
        assert_eq!(" LOCAL_WINS ".parse::<StartupPolicy>(), Ok(StartupPolicy::LocalWins));
        assert_eq!("local-wins".parse::<StartupPolicy>(), Ok(StartupPolicy::LocalWins));
        assert_eq!(
            "remote".parse::<StartupPolicy>(),
            Err(UnknownStartupPolicy("remote".to_string()))
        );
        assert_eq!(StartupPolicy::default(), StartupPolicy::Merge);
    }

    #[tokio::test]
    async fn test_offline_startup_records_status() {
        let (service, store) = offline_service(StartupPolicy::Merge).await;

        assert_eq!(service.run_startup_reconciliation().await, StartupOutcome::Offline);

        let status = store.sync_status().await;
        assert!(!status.is_online);
        assert_eq!(status.sync_error.as_deref(), Some(OFFLINE_MESSAGE));
    }

    #[tokio::test]
    async fn test_unload_failure_asks_for_confirmation() {
        let (service, store) = offline_service(StartupPolicy::Merge).await;

        let decision = service.on_unload().await;

        assert_eq!(decision, UnloadDecision::ConfirmLeave(UNSAVED_DATA_WARNING.to_string()));
        assert!(store.sync_status().await.sync_error.is_some());
        assert!(!store.sync_status().await.is_syncing);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (service, _) = offline_service(StartupPolicy::LocalWins).await;

        service.start().await;
        service.start().await;
        assert!(service.is_running().await);

        service.stop().await;
        assert!(!service.is_running().await);
        assert!(service.listener.lock().await.is_none());
    }
}
