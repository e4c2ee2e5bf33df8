//! Offline-first workout log with remote sync and progress tracking.

pub mod catalog;
pub mod config;
pub mod db;
pub mod identity;
pub mod progress;
pub mod store;
pub mod sync;

use std::sync::Arc;

use config::Config;
use db::{Database, DbError, LocalStore};
use store::WorkoutStore;
use sync::{BackgroundSyncService, SupabaseClient};

pub struct AppState {
    pub db: Arc<Database>,
    pub device_id: String,
    pub store: Arc<WorkoutStore>,
    pub background_sync: Arc<BackgroundSyncService>,
}

impl AppState {
    /// Open the configured database and build the full stack on top of it.
    pub async fn initialize(config: &Config) -> Result<Self, DbError> {
        let db = Database::open(&config.db_path).await?;
        Ok(Self::with_database(Arc::new(db), config).await)
    }

    /// Build the stack on an already opened database and load the store.
    pub async fn with_database(db: Arc<Database>, config: &Config) -> Self {
        let local = LocalStore::new(db.clone());
        let device_id = identity::get_or_create_device_id(&local).await;

        let remote = Arc::new(
            SupabaseClient::new(&config.supabase_url, &config.supabase_anon_key, &device_id)
                .with_timeout(config.http_timeout),
        );
        let store = Arc::new(WorkoutStore::new(local, remote));
        store.init().await;

        let background_sync = Arc::new(BackgroundSyncService::new(
            store.clone(),
            config.sync_debounce,
            config.startup_policy,
        ));

        Self {
            db,
            device_id,
            store,
            background_sync,
        }
    }
}
