//! Snapshot of connected clients taken at the start of each tick.

use idlemover_reconcile::Participant;
use tracing::{debug, error};

use crate::client::SessionClient;

/// Fetch all connected voice clients.
///
/// Query connections (bots, management tools) are dropped. A failed listing
/// yields an empty snapshot, so the tick moves nobody.
pub async fn build_snapshot(client: &dyn SessionClient) -> Vec<Participant> {
    let all = match client.list_participants().await {
        Ok(all) => all,
        Err(e) => {
            error!(error = %e, "Failed to list clients");
            return Vec::new();
        }
    };

    let total = all.len();
    let humans: Vec<Participant> = all.into_iter().filter(Participant::is_human).collect();

    debug!(
        total,
        voice_clients = humans.len(),
        query_clients = total - humans.len(),
        "Client snapshot built"
    );

    humans
}
