//! One reconciliation pass: snapshot, return phase, relocation phase.

use std::sync::Arc;

use idlemover_id::ChannelId;
use idlemover_reconcile::{IdlePolicy, IdleVerdict, Participant, ReturnVerdict};
use tracing::{debug, error, info, instrument, trace};

use crate::client::SessionClient;
use crate::config::MoverConfig;
use crate::groups::GroupExclusion;
use crate::mover::{HoldingMover, MoveStats};
use crate::restore::{RestoreStats, Restorer};
use crate::snapshot::build_snapshot;
use crate::tracking::TrackingStore;

/// Summary of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Voice clients in the snapshot.
    pub snapshot_size: usize,

    /// Clients moved into holding.
    pub moved_to_holding: usize,

    /// Clients moved back to their origin.
    pub moved_back: usize,

    /// Clients moved to the fallback channel.
    pub fallbacks: usize,

    /// Moves that failed or were refused.
    pub failures: usize,
}

impl TickReport {
    fn merge(&mut self, moves: MoveStats, restores: RestoreStats) {
        self.moved_to_holding = moves.moved;
        self.moved_back = restores.restored;
        self.fallbacks = restores.fallbacks;
        self.failures = moves.failed + restores.refused;
    }

    /// Returns true if the pass neither moved nor tried to move anyone.
    pub fn is_quiet(&self) -> bool {
        self.moved_to_holding == 0 && self.moved_back == 0 && self.fallbacks == 0 && self.failures == 0
    }

    pub fn log(&self) {
        if self.is_quiet() {
            debug!(snapshot_size = self.snapshot_size, "Tick finished, nothing to do");
        } else {
            info!(
                snapshot_size = self.snapshot_size,
                moved_to_holding = self.moved_to_holding,
                moved_back = self.moved_back,
                fallbacks = self.fallbacks,
                failures = self.failures,
                "Tick finished"
            );
        }
    }
}

/// Runs reconciliation passes for one running instance.
pub struct IdleReconciler {
    client: Arc<dyn SessionClient>,
    policy: IdlePolicy,
    auto_move_back: bool,
    exclusion: GroupExclusion,
    mover: HoldingMover,
    restorer: Restorer,
}

impl IdleReconciler {
    /// Create a reconciler over a resolved holding channel and group set.
    pub fn new(
        client: Arc<dyn SessionClient>,
        config: &MoverConfig,
        holding: ChannelId,
        exclusion: GroupExclusion,
        tracking: Arc<TrackingStore>,
    ) -> Self {
        let policy = IdlePolicy {
            threshold: config.idle_threshold(),
            holding,
        };
        let mover = HoldingMover::new(
            Arc::clone(&client),
            Arc::clone(&tracking),
            holding,
            config.dry_run,
        );
        let restorer = Restorer::new(
            Arc::clone(&client),
            tracking,
            config.respect_destination_limits,
            config.fallback_channel().map(str::to_string),
        );

        Self {
            client,
            policy,
            auto_move_back: config.auto_move_back,
            exclusion,
            mover,
            restorer,
        }
    }

    pub fn policy(&self) -> &IdlePolicy {
        &self.policy
    }

    /// Clients to move to holding, in snapshot order.
    ///
    /// Group membership is only queried for clients that pass the cheap
    /// checks, one round-trip each.
    pub async fn idle_candidates<'a>(&self, snapshot: &'a [Participant]) -> Vec<&'a Participant> {
        let mut candidates = Vec::new();

        for participant in snapshot {
            match IdleVerdict::of(participant, &self.policy) {
                IdleVerdict::Relocate => {}
                verdict @ (IdleVerdict::MissingChannel | IdleVerdict::MissingIdleTime) => {
                    error!(client_id = %participant.id, ?verdict, "Client listing is incomplete");
                    continue;
                }
                verdict => {
                    trace!(client_id = %participant.id, ?verdict, "Not an idle candidate");
                    continue;
                }
            }
            if self
                .exclusion
                .is_excluded(self.client.as_ref(), participant)
                .await
            {
                continue;
            }
            candidates.push(participant);
        }

        candidates
    }

    /// Clients in holding that are active again, in snapshot order.
    pub fn return_candidates<'a>(&self, snapshot: &'a [Participant]) -> Vec<&'a Participant> {
        snapshot
            .iter()
            .filter(|p| match ReturnVerdict::of(p, &self.policy) {
                ReturnVerdict::Restore => true,
                // Already reported by the idle phase
                ReturnVerdict::MissingChannel | ReturnVerdict::MissingIdleTime => false,
                verdict => {
                    trace!(client_id = %p.id, ?verdict, "Not a return candidate");
                    false
                }
            })
            .collect()
    }

    /// Run one pass.
    #[instrument(skip(self), fields(holding_channel_id = %self.policy.holding))]
    pub async fn reconcile(&self) -> TickReport {
        let snapshot = build_snapshot(self.client.as_ref()).await;
        let mut report = TickReport {
            snapshot_size: snapshot.len(),
            ..TickReport::default()
        };

        let restores = if self.auto_move_back {
            let returning = self.return_candidates(&snapshot);
            debug!(candidates = returning.len(), "Return candidates");
            self.restorer.restore(&returning).await
        } else {
            RestoreStats::default()
        };

        let idle = self.idle_candidates(&snapshot).await;
        debug!(candidates = idle.len(), "Idle candidates");
        let moves = self.mover.relocate(&idle).await;

        report.merge(moves, restores);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSessionClient;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const LOBBY: ChannelId = ChannelId::new(10);
    const HOLDING: ChannelId = ChannelId::new(99);

    fn config() -> MoverConfig {
        MoverConfig {
            idle_threshold_seconds: 60.0,
            ..MoverConfig::default()
        }
    }

    fn setup() -> (Arc<MockSessionClient>, Arc<TrackingStore>) {
        let mock = Arc::new(MockSessionClient::new());
        mock.add_channel(10, "Lobby");
        mock.add_channel(99, "AFK");
        (mock, Arc::new(TrackingStore::new()))
    }

    fn reconciler(
        mock: &Arc<MockSessionClient>,
        tracking: &Arc<TrackingStore>,
        config: &MoverConfig,
        exclusion: GroupExclusion,
    ) -> IdleReconciler {
        IdleReconciler::new(mock.clone(), config, HOLDING, exclusion, Arc::clone(tracking))
    }

    #[tokio::test]
    async fn test_candidates_are_stable_across_calls() {
        let (mock, tracking) = setup();
        mock.add_client(1, LOBBY, Duration::from_secs(120));
        mock.add_client(2, LOBBY, Duration::from_secs(5));
        mock.add_client(3, HOLDING, Duration::from_secs(5));
        let r = reconciler(&mock, &tracking, &config(), GroupExclusion::disabled());
        let snapshot = build_snapshot(mock.as_ref()).await;

        let first: Vec<_> = r.idle_candidates(&snapshot).await.iter().map(|p| p.id).collect();
        let second: Vec<_> = r.idle_candidates(&snapshot).await.iter().map(|p| p.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);

        let returning = r.return_candidates(&snapshot);
        assert_eq!(returning.len(), 1);
        assert!(tracking.is_empty().await);
    }

    #[tokio::test]
    async fn test_excluded_group_is_never_a_candidate() {
        let (mock, tracking) = setup();
        let admins = mock.add_group(6, "Admins");
        let alice = mock.add_client(1, LOBBY, Duration::from_secs(3600));
        mock.assign_group(alice, admins);
        let names: BTreeSet<String> = ["Admins".to_string()].into();
        let exclusion = GroupExclusion::resolve(mock.as_ref(), names).await;
        let r = reconciler(&mock, &tracking, &config(), exclusion);

        let report = r.reconcile().await;

        assert_eq!(report.moved_to_holding, 0);
        assert_eq!(mock.channel_of(alice), Some(LOBBY));
    }

    #[tokio::test]
    async fn test_return_disabled_leaves_holding_alone() {
        let (mock, tracking) = setup();
        let alice = mock.add_client(1, HOLDING, Duration::ZERO);
        tracking.lock().await.record(alice, LOBBY);
        let config = MoverConfig {
            auto_move_back: false,
            ..config()
        };
        let r = reconciler(&mock, &tracking, &config, GroupExclusion::disabled());

        let report = r.reconcile().await;

        assert!(report.is_quiet());
        assert_eq!(mock.channel_of(alice), Some(HOLDING));
        assert_eq!(tracking.origin(alice).await, Some(LOBBY));
    }

    #[tokio::test]
    async fn test_pass_reports_moves() {
        let (mock, tracking) = setup();
        let idle = mock.add_client(1, LOBBY, Duration::from_secs(3600));
        let back = mock.add_client(2, HOLDING, Duration::ZERO);
        tracking.lock().await.record(back, LOBBY);
        let r = reconciler(&mock, &tracking, &config(), GroupExclusion::disabled());

        let report = r.reconcile().await;

        assert_eq!(report.snapshot_size, 2);
        assert_eq!(report.moved_to_holding, 1);
        assert_eq!(report.moved_back, 1);
        assert_eq!(mock.channel_of(idle), Some(HOLDING));
        assert_eq!(mock.channel_of(back), Some(LOBBY));
        assert_eq!(tracking.snapshot().await.into_iter().collect::<Vec<_>>(), vec![(idle, LOBBY)]);
    }
}
