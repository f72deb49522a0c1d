//! Relocation of idle clients into the holding channel.

use std::sync::Arc;

use idlemover_id::ChannelId;
use idlemover_reconcile::Participant;
use tracing::{debug, error, info};

use crate::client::SessionClient;
use crate::tracking::TrackingStore;

/// Counters for one relocation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveStats {
    pub moved: usize,
    pub dry_run: usize,
    pub failed: usize,
}

/// Moves idle clients to the holding channel and records where they came
/// from.
pub struct HoldingMover {
    client: Arc<dyn SessionClient>,
    tracking: Arc<TrackingStore>,
    holding: ChannelId,
    dry_run: bool,
}

impl HoldingMover {
    pub fn new(
        client: Arc<dyn SessionClient>,
        tracking: Arc<TrackingStore>,
        holding: ChannelId,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            tracking,
            holding,
            dry_run,
        }
    }

    /// Move every candidate to holding. One failure never aborts the batch.
    pub async fn relocate(&self, candidates: &[&Participant]) -> MoveStats {
        let mut stats = MoveStats::default();

        for participant in candidates {
            let Some(origin) = participant.channel else {
                continue;
            };

            if self.dry_run {
                info!(
                    client_id = %participant.id,
                    nickname = %participant.nickname,
                    channel_id = %origin,
                    holding_channel_id = %self.holding,
                    "Dry run: would move idle client to holding channel"
                );
                stats.dry_run += 1;
                continue;
            }

            let mut tracked = self.tracking.lock().await;
            match self.client.move_client(participant.id, self.holding).await {
                Ok(()) => {
                    tracked.record(participant.id, origin);
                    info!(
                        client_id = %participant.id,
                        nickname = %participant.nickname,
                        origin_channel_id = %origin,
                        "Moved idle client to holding channel"
                    );
                    stats.moved += 1;
                }
                Err(e) => {
                    error!(
                        client_id = %participant.id,
                        nickname = %participant.nickname,
                        error = %e,
                        "Failed to move idle client to holding channel"
                    );
                    stats.failed += 1;
                }
            }
        }

        debug!(
            moved = stats.moved,
            dry_run = stats.dry_run,
            failed = stats.failed,
            "Relocation batch finished"
        );

        stats
    }
}
