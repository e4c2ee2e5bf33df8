use gym_tracker::config::Config;
use gym_tracker::sync::UnloadDecision;
use gym_tracker::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gym_tracker=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::initialize(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Running as device {}", state.device_id);

    let outcome = state.background_sync.run_startup_reconciliation().await;
    tracing::info!("Startup reconciliation: {:?}", outcome);
    state.background_sync.start().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    if let UnloadDecision::ConfirmLeave(warning) = state.background_sync.on_unload().await {
        tracing::warn!("{}", warning);
    }
    state.background_sync.stop().await;
}
