use anyhow::{Context, Result};
use culturelens::config::Config;
use culturelens::localizer::Localizer;
use culturelens::metrics::LocalizationMetrics;
use culturelens::profile::{InMemoryProfileStore, ProfileStore};
use culturelens::server::{self, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when variables come from the environment)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("culturelens=info".parse()?),
        )
        .init();

    info!("Starting culturelens");

    let config = Config::from_env().context("Failed to load configuration")?;

    let profiles: Arc<dyn ProfileStore> = match &config.profiles_file {
        Some(path) => {
            let store = InMemoryProfileStore::from_file(path)?;
            info!("Loaded {} profiles from {}", store.len(), path);
            Arc::new(store)
        }
        None => {
            info!("No PROFILES_FILE set; only inline profiles will be accepted");
            Arc::new(InMemoryProfileStore::default())
        }
    };

    let metrics = Arc::new(LocalizationMetrics::new());
    let localizer = Arc::new(Localizer::from_config(&config, metrics.clone()));
    localizer.start_cache_sweeper();

    let state = AppState {
        localizer,
        profiles,
        metrics,
        api_key: config.api_key.clone(),
    };

    if state.api_key.is_none() {
        info!("API_KEY not set; /localize and /metrics are open");
    }

    server::serve(state, config.port).await
}
