//! Shared fixtures for idle mover integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use idlemover_bot::groups::GroupExclusion;
use idlemover_bot::mock::MockSessionClient;
use idlemover_bot::{IdleReconciler, MoverConfig, TickReport, TrackingStore};
use idlemover_id::ChannelId;

pub const LOBBY: ChannelId = ChannelId::new(10);
pub const HOLDING: ChannelId = ChannelId::new(99);
pub const FALLBACK: ChannelId = ChannelId::new(50);

/// Idle threshold used by [`config`].
pub const THRESHOLD: Duration = Duration::from_secs(600);

/// Well past the threshold.
pub const LONG_IDLE: Duration = Duration::from_secs(3600);

/// Just became active.
pub const ACTIVE: Duration = Duration::from_secs(1);

/// A server with a lobby, the holding channel and a fallback channel.
pub fn server() -> Arc<MockSessionClient> {
    let mock = Arc::new(MockSessionClient::new());
    mock.add_channel(10, "Lobby");
    mock.add_channel(99, "AFK");
    mock.add_channel(50, "Fallback");
    mock
}

/// Defaults, with a 30s check interval and no fallback.
pub fn config() -> MoverConfig {
    MoverConfig {
        check_frequency_seconds: 30.0,
        idle_threshold_seconds: THRESHOLD.as_secs_f64(),
        ..MoverConfig::default()
    }
}

/// A reconciler driven tick by tick, without a worker.
pub struct Harness {
    pub mock: Arc<MockSessionClient>,
    pub tracking: Arc<TrackingStore>,
    reconciler: IdleReconciler,
}

impl Harness {
    pub async fn new(mock: Arc<MockSessionClient>, config: MoverConfig) -> Self {
        let exclusion =
            GroupExclusion::resolve(mock.as_ref(), config.excluded_group_names()).await;
        let tracking = Arc::new(TrackingStore::new());
        let reconciler = IdleReconciler::new(
            mock.clone(),
            &config,
            HOLDING,
            exclusion,
            Arc::clone(&tracking),
        );
        Self {
            mock,
            tracking,
            reconciler,
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.reconciler.reconcile().await
    }
}
