use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::auth::jwt::TokenService;
use crate::config::TokenCleanupConfig;

/// Handle to the background task purging expired token records.
pub struct TokenCleanupWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl TokenCleanupWorker {
    pub fn from_config(tokens: Arc<TokenService>, cfg: &TokenCleanupConfig) -> Self {
        Self::spawn(
            tokens,
            Duration::from_secs(cfg.interval_minutes.max(1) * 60),
            time::Duration::hours(cfg.retention_hours.max(0)),
        )
    }

    pub fn spawn(tokens: Arc<TokenService>, every: Duration, retention: time::Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(async move {
            info!(?every, "token cleanup started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = sleep(every) => {
                        if let Err(e) = tokens.purge_expired(retention).await {
                            error!(error = %e, "token cleanup failed");
                        }
                    }
                }
            }
            info!("token cleanup stopped");
        });
        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}
