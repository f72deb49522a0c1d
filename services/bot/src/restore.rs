//! Moving active clients back out of the holding channel.
//!
//! For each tracked client the origin channel is checked (client limit and
//! password, when limits are respected) and the client is moved back. Any
//! refusal, whether from the pre-check or from the server, ends in the
//! fallback action. The pre-check is best effort only: occupancy can change
//! between the check and the move, and the server's answer to the move is
//! what counts.

use std::collections::HashMap;
use std::sync::Arc;

use idlemover_id::ChannelId;
use idlemover_reconcile::{check_admission, Admission, Participant};
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, RejectReason, SessionClient};
use crate::tracking::{TrackingError, TrackingGuard, TrackingStore};

/// Counters for one restore batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    /// Clients moved back to their origin.
    pub restored: usize,

    /// Clients moved to the fallback channel instead.
    pub fallbacks: usize,

    /// Clients whose return was refused or failed.
    pub refused: usize,

    /// Candidates with no tracking entry.
    pub untracked: usize,
}

/// Outcome of a fallback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// No fallback configured; client stays in holding and stays tracked.
    Skipped,

    /// Client moved to the fallback channel and released.
    Moved,

    /// Fallback lookup or move failed; entry left in place.
    Failed,
}

/// Restores clients to the channel they were taken from.
pub struct Restorer {
    client: Arc<dyn SessionClient>,
    tracking: Arc<TrackingStore>,
    respect_limits: bool,
    fallback_channel: Option<String>,
}

impl Restorer {
    pub fn new(
        client: Arc<dyn SessionClient>,
        tracking: Arc<TrackingStore>,
        respect_limits: bool,
        fallback_channel: Option<String>,
    ) -> Self {
        Self {
            client,
            tracking,
            respect_limits,
            fallback_channel,
        }
    }

    /// Move every tracked candidate back.
    pub async fn restore(&self, candidates: &[&Participant]) -> RestoreStats {
        let mut stats = RestoreStats::default();
        if candidates.is_empty() {
            return stats;
        }

        // One channel listing per tick, shared by all candidates
        let occupancy: HashMap<ChannelId, u32> = match self.client.list_channels().await {
            Ok(channels) => channels
                .into_iter()
                .map(|c| (c.id, c.total_clients))
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to list channels, not moving anyone back this tick");
                return stats;
            }
        };

        for participant in candidates {
            let mut tracked = self.tracking.lock().await;
            let Some(origin) = tracked.origin(participant.id) else {
                debug!(
                    client_id = %participant.id,
                    "Client in holding channel was not moved there by us"
                );
                stats.untracked += 1;
                continue;
            };

            info!(
                client_id = %participant.id,
                nickname = %participant.nickname,
                origin_channel_id = %origin,
                "Moving client back"
            );

            if let Some(refusal) = self
                .precheck(participant, origin, occupancy.get(&origin).copied())
                .await
            {
                debug!(client_id = %participant.id, refusal, "Return refused before moving");
                stats.refused += 1;
                self.count_fallback(&mut stats, &mut tracked, participant).await;
                continue;
            }

            match self.client.move_client(participant.id, origin).await {
                Ok(()) => {
                    if let Err(e) = tracked.release(participant.id) {
                        error!(error = %e, "Tracking entry vanished while the lock was held");
                    }
                    stats.restored += 1;
                }
                Err(e) => {
                    log_move_back_failure(participant, origin, &e);
                    stats.refused += 1;
                    self.count_fallback(&mut stats, &mut tracked, participant).await;
                }
            }
        }

        stats
    }

    /// Destination checks before attempting the move. Returns the refusal
    /// label, or `None` to go ahead.
    async fn precheck(
        &self,
        participant: &Participant,
        origin: ChannelId,
        occupancy: Option<u32>,
    ) -> Option<&'static str> {
        let detail = match self.client.channel_detail(origin).await {
            Ok(detail) => detail,
            Err(e) if e.reject_reason() == Some(RejectReason::DestinationGone) => {
                error!(
                    client_id = %participant.id,
                    origin_channel_id = %origin,
                    "Origin channel does not exist anymore"
                );
                return Some("destination_gone");
            }
            Err(e) => {
                warn!(
                    client_id = %participant.id,
                    origin_channel_id = %origin,
                    error = %e,
                    "Failed to fetch origin channel info, moving without checks"
                );
                return None;
            }
        };

        if !self.respect_limits {
            return None;
        }

        match check_admission(&detail, occupancy) {
            Admission::Admit => None,
            Admission::Full { occupancy, limit } => {
                warn!(
                    client_id = %participant.id,
                    origin_channel_id = %origin,
                    occupancy,
                    limit,
                    "Not moving client back, origin channel is full"
                );
                Some("destination_full")
            }
            Admission::PasswordProtected => {
                warn!(
                    client_id = %participant.id,
                    origin_channel_id = %origin,
                    "Not moving client back, origin channel has a password"
                );
                Some("access_denied")
            }
        }
    }

    async fn count_fallback(
        &self,
        stats: &mut RestoreStats,
        tracked: &mut TrackingGuard<'_>,
        participant: &Participant,
    ) {
        if self.fallback(tracked, participant).await == FallbackOutcome::Moved {
            stats.fallbacks += 1;
        }
    }

    /// Secondary move after a failed return.
    pub(crate) async fn fallback(
        &self,
        tracked: &mut TrackingGuard<'_>,
        participant: &Participant,
    ) -> FallbackOutcome {
        let Some(name) = self.fallback_channel.as_deref() else {
            debug!(
                client_id = %participant.id,
                "No fallback channel configured, client stays in holding"
            );
            return FallbackOutcome::Skipped;
        };

        let target = match self.client.find_channel(name).await {
            Ok(target) => target,
            Err(e) => {
                error!(fallback_channel = %name, error = %e, "Failed to resolve fallback channel");
                return FallbackOutcome::Failed;
            }
        };

        if let Err(e) = self.client.move_client(participant.id, target).await {
            error!(
                client_id = %participant.id,
                fallback_channel_id = %target,
                error = %e,
                "Failed to move client to fallback channel"
            );
            return FallbackOutcome::Failed;
        }

        match tracked.release(participant.id) {
            Ok(_) => {}
            Err(TrackingError::NotTracked(_)) => {
                debug!(client_id = %participant.id, "Client was no longer tracked");
            }
        }

        info!(
            client_id = %participant.id,
            fallback_channel_id = %target,
            "Moved client to fallback channel"
        );
        FallbackOutcome::Moved
    }
}

fn log_move_back_failure(participant: &Participant, origin: ChannelId, err: &ClientError) {
    match err.reject_reason() {
        Some(RejectReason::DestinationGone) => error!(
            client_id = %participant.id,
            origin_channel_id = %origin,
            "Failed to move client back, origin channel does not exist anymore"
        ),
        Some(RejectReason::DestinationFull) => error!(
            client_id = %participant.id,
            origin_channel_id = %origin,
            "Failed to move client back, origin channel reached its client limit"
        ),
        Some(RejectReason::AccessDenied) => error!(
            client_id = %participant.id,
            origin_channel_id = %origin,
            "Failed to move client back, origin channel has an unknown password"
        ),
        Some(RejectReason::Unclassified) | None => error!(
            client_id = %participant.id,
            origin_channel_id = %origin,
            error = %err,
            "Failed to move client back"
        ),
    }
}
