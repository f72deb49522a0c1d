//! Server groups whose members are never moved.
//!
//! Group names are resolved to ids once per start. Both resolution and
//! per-client lookups fail open: on error nothing is excluded.

use std::collections::{BTreeSet, HashSet};

use idlemover_id::ServerGroupId;
use idlemover_reconcile::Participant;
use tracing::{debug, error, info, warn};

use crate::client::SessionClient;

/// Resolved group exclusion.
#[derive(Debug, Clone, Default)]
pub struct GroupExclusion {
    excluded: HashSet<ServerGroupId>,
}

impl GroupExclusion {
    /// No exclusion configured.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve configured group names to ids.
    pub async fn resolve(client: &dyn SessionClient, names: BTreeSet<String>) -> Self {
        if names.is_empty() {
            debug!("No server groups to exclude");
            return Self::disabled();
        }

        let groups = match client.list_server_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "Failed to list server groups, excluding nobody");
                return Self::disabled();
            }
        };

        let excluded: HashSet<ServerGroupId> = groups
            .iter()
            .filter(|g| names.contains(&g.name))
            .map(|g| g.id)
            .collect();

        let unmatched: Vec<&String> = names
            .iter()
            .filter(|name| !groups.iter().any(|g| &g.name == *name))
            .collect();
        if !unmatched.is_empty() {
            warn!(unmatched = ?unmatched, "Excluded server groups not found on server");
        }

        info!(
            configured = names.len(),
            resolved = excluded.len(),
            "Resolved excluded server groups"
        );

        Self { excluded }
    }

    /// Resolved ids.
    pub fn excluded_ids(&self) -> &HashSet<ServerGroupId> {
        &self.excluded
    }

    /// Groups of a client's account. Empty on failure.
    pub async fn groups_of(
        client: &dyn SessionClient,
        participant: &Participant,
    ) -> HashSet<ServerGroupId> {
        match client.server_groups_of(participant.database_id).await {
            Ok(groups) => groups.into_iter().collect(),
            Err(e) => {
                error!(
                    client_id = %participant.id,
                    database_id = %participant.database_id,
                    error = %e,
                    "Failed to list server groups of client"
                );
                HashSet::new()
            }
        }
    }

    /// Returns true if the client belongs to an excluded group.
    pub async fn is_excluded(&self, client: &dyn SessionClient, participant: &Participant) -> bool {
        // Nothing resolved means nothing can match; skip the round-trip
        if self.excluded.is_empty() {
            return false;
        }

        let groups = Self::groups_of(client, participant).await;
        match groups.iter().find(|g| self.excluded.contains(g)) {
            Some(group) => {
                debug!(
                    client_id = %participant.id,
                    server_group_id = %group,
                    "Client is in an excluded server group"
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSessionClient;
    use std::time::Duration;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_matches_exact_names() {
        let mock = MockSessionClient::new();
        let admin = mock.add_group(6, "Server Admin");
        mock.add_group(7, "Guest");
        mock.add_group(8, "Server Admins");

        let exclusion = GroupExclusion::resolve(&mock, names(&["Server Admin", "Missing"])).await;

        assert_eq!(exclusion.excluded_ids().len(), 1);
        assert!(exclusion.excluded_ids().contains(&admin));
    }

    #[tokio::test]
    async fn test_resolve_fails_open() {
        let mock = MockSessionClient::new();
        mock.add_group(6, "Server Admin");
        mock.fail_group_listing(true);

        let exclusion = GroupExclusion::resolve(&mock, names(&["Server Admin"])).await;

        assert!(exclusion.excluded_ids().is_empty());
    }

    #[tokio::test]
    async fn test_is_excluded() {
        let mock = MockSessionClient::new();
        let lobby = mock.add_channel(1, "Lobby");
        let admin = mock.add_group(6, "Server Admin");
        let alice = mock.add_client(10, lobby, Duration::ZERO);
        let bob = mock.add_client(11, lobby, Duration::ZERO);
        mock.assign_group(alice, admin);

        let exclusion = GroupExclusion::resolve(&mock, names(&["Server Admin"])).await;
        let snapshot = mock.list_participants().await.unwrap();
        let alice = snapshot.iter().find(|p| p.id == alice).unwrap();
        let bob = snapshot.iter().find(|p| p.id == bob).unwrap();

        assert!(exclusion.is_excluded(&mock, alice).await);
        assert!(!exclusion.is_excluded(&mock, bob).await);

        // Membership lookup failure fails open
        mock.fail_membership_lookup(true);
        assert!(!exclusion.is_excluded(&mock, alice).await);
    }

    #[tokio::test]
    async fn test_disabled_never_excludes() {
        let mock = MockSessionClient::new();
        mock.add_group(6, "Server Admin");
        let exclusion = GroupExclusion::resolve(&mock, BTreeSet::new()).await;
        assert!(exclusion.excluded_ids().is_empty());
    }
}
