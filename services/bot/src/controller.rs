//! Lifecycle of the idle mover: stopped or running.
//!
//! At most one worker exists at a time. Its handle lives in an
//! `Option` behind a mutex, so `start` on a running mover is a no-op and
//! `stop` waits for the worker to finish its current pass before returning.

use std::collections::BTreeMap;
use std::sync::Arc;

use idlemover_id::{ChannelId, ClientId};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::{ClientError, SessionClient};
use crate::config::MoverConfig;
use crate::groups::GroupExclusion;
use crate::reconciler::IdleReconciler;
use crate::tracking::TrackingStore;
use crate::worker::MoverWorker;

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Errors that prevent the mover from starting.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to resolve holding channel '{name}': {source}")]
    HoldingChannel {
        name: String,
        #[source]
        source: ClientError,
    },
}

/// A running worker and the state it owns.
struct RunningMover {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    tracking: Arc<TrackingStore>,
}

/// Starts and stops the mover.
pub struct Controller {
    client: Arc<dyn SessionClient>,
    config: Arc<MoverConfig>,
    running: Mutex<Option<RunningMover>>,
}

impl Controller {
    pub fn new(client: Arc<dyn SessionClient>, config: MoverConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            running: Mutex::new(None),
        }
    }

    /// Start the mover unless it is already running.
    ///
    /// Resolves the holding channel and the excluded groups, then spawns the
    /// worker with an empty tracking store.
    pub async fn start(&self) -> Result<StartOutcome, StartError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Idle mover already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let holding = self.resolve_holding().await?;
        let exclusion =
            GroupExclusion::resolve(self.client.as_ref(), self.config.excluded_group_names())
                .await;

        let tracking = Arc::new(TrackingStore::new());
        let reconciler = IdleReconciler::new(
            Arc::clone(&self.client),
            &self.config,
            holding,
            exclusion,
            Arc::clone(&tracking),
        );
        let worker = MoverWorker::new(
            reconciler,
            Arc::clone(&tracking),
            self.config.check_frequency(),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        info!(
            holding_channel = %self.config.holding_location_name,
            holding_channel_id = %holding,
            dry_run = self.config.dry_run,
            "Starting idle mover"
        );

        *running = Some(RunningMover {
            shutdown,
            handle,
            tracking,
        });
        Ok(StartOutcome::Started)
    }

    /// Stop the mover and wait for the worker to exit.
    pub async fn stop(&self) -> StopOutcome {
        let mut running = self.running.lock().await;
        let Some(mover) = running.take() else {
            return StopOutcome::NotRunning;
        };

        info!("Stopping idle mover");
        let _ = mover.shutdown.send(true);
        if let Err(e) = mover.handle.await {
            error!(error = %e, "Idle mover worker ended abnormally");
        }
        mover.tracking.clear().await;

        StopOutcome::Stopped
    }

    /// Stop (if running), then start.
    pub async fn restart(&self) -> Result<StartOutcome, StartError> {
        self.stop().await;
        self.start().await
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// A client disconnected. Returns true if it was tracked.
    pub async fn on_client_left(&self, client: ClientId) -> bool {
        let tracking = match self.running.lock().await.as_ref() {
            Some(mover) => Arc::clone(&mover.tracking),
            None => return false,
        };

        match tracking.forget(client).await {
            Some(origin) => {
                debug!(
                    client_id = %client,
                    origin_channel_id = %origin,
                    "Tracked client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Tracking entries of the running mover, if any.
    pub async fn tracked_snapshot(&self) -> Option<BTreeMap<ClientId, ChannelId>> {
        let tracking = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|mover| Arc::clone(&mover.tracking))?;
        Some(tracking.snapshot().await)
    }

    async fn resolve_holding(&self) -> Result<ChannelId, StartError> {
        let name = &self.config.holding_location_name;
        self.client
            .find_channel(name)
            .await
            .map_err(|source| StartError::HoldingChannel {
                name: name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSessionClient;

    fn controller(mock: &Arc<MockSessionClient>) -> Controller {
        Controller::new(mock.clone(), MoverConfig::default())
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mock = Arc::new(MockSessionClient::new());
        mock.add_channel(99, "AFK");
        let controller = controller(&mock);

        assert_eq!(controller.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(controller.start().await.unwrap(), StartOutcome::AlreadyRunning);
        assert!(controller.is_running().await);

        assert_eq!(controller.stop().await, StopOutcome::Stopped);
        assert_eq!(controller.stop().await, StopOutcome::NotRunning);
        assert!(!controller.is_running().await);
    }

    #[tokio::test]
    async fn test_start_fails_without_holding_channel() {
        let mock = Arc::new(MockSessionClient::new());
        let controller = controller(&mock);

        let err = controller.start().await.unwrap_err();
        assert!(err.to_string().contains("AFK"));
        assert!(!controller.is_running().await);
    }

    #[tokio::test]
    async fn test_disconnect_while_stopped_is_ignored() {
        let mock = Arc::new(MockSessionClient::new());
        let controller = controller(&mock);

        assert!(!controller.on_client_left(ClientId::new(1)).await);
        assert_eq!(controller.tracked_snapshot().await, None);
    }
}
