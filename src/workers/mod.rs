use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info};

use crate::state::AppState;

pub mod closed_briefs;

/// Periodic background loop. Each tick is an independent, idempotent sweep
/// against the shared store; a failed tick is logged and retried on the next
/// interval.
pub struct Worker {
    state: Arc<AppState>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(state: Arc<AppState>, poll_interval: Duration) -> Self {
        Self {
            state,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        info!("worker started");
        loop {
            match closed_briefs::scan(&self.state).await {
                Ok(0) => {}
                Ok(notified) => info!(notified, "closed-brief scan completed"),
                Err(err) => error!(error = %err, "closed-brief scan failed"),
            }
            sleep(self.poll_interval).await;
        }
    }
}
