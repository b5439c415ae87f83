use std::{sync::Arc, time::Duration};

use tokio::signal;
use tracing_subscriber::EnvFilter;

use marketplace_api::{config::AppConfig, db, notify::LoggingNotifier, state::AppState, Worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        poll_seconds = config.worker_poll_seconds,
        "loaded marketplace configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let poll_interval = Duration::from_secs(config.worker_poll_seconds);
    let state = Arc::new(AppState::new(pool, config, Arc::new(LoggingNotifier)));
    let worker = Worker::new(state, poll_interval);

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
