//! Session client interface.
//!
//! The mover only talks to the voice server through [`SessionClient`], so the
//! reconciliation logic can run against the query-protocol client in
//! production and against [`MockSessionClient`](crate::mock::MockSessionClient)
//! in tests.

use async_trait::async_trait;
use idlemover_id::{ChannelId, ClientDbId, ClientId, ServerGroupId};
use idlemover_query::QueryError;
use idlemover_reconcile::{Channel, ChannelDetail, Participant, ServerGroup};
use thiserror::Error;

/// Why the server refused a command.
///
/// Raw protocol codes are translated into this enumeration by the client
/// implementation; the mover only ever matches on these categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Destination channel does not exist (anymore).
    DestinationGone,

    /// Destination channel or its family reached the client limit.
    DestinationFull,

    /// Destination channel requires a password we do not have.
    AccessDenied,

    /// Any other refusal.
    Unclassified,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::DestinationGone => "destination_gone",
            RejectReason::DestinationFull => "destination_full",
            RejectReason::AccessDenied => "access_denied",
            RejectReason::Unclassified => "unclassified",
        };
        write!(f, "{s}")
    }
}

/// Errors returned by a [`SessionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server refused the command.
    #[error("rejected ({reason}, code {code}): {message}")]
    Rejected {
        reason: RejectReason,
        code: u32,
        message: String,
    },

    /// No channel matches the requested name.
    #[error("no channel named '{0}'")]
    ChannelNotFound(String),

    /// Transport or protocol failure.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ClientError {
    /// The refusal category, if the server refused the command.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ClientError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Queries and mutations the mover needs from a voice server.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// All connected clients, including idle time.
    async fn list_participants(&self) -> Result<Vec<Participant>, ClientError>;

    /// All channels with their current occupancy.
    async fn list_channels(&self) -> Result<Vec<Channel>, ClientError>;

    /// Client limit and password flag of one channel.
    async fn channel_detail(&self, channel: ChannelId) -> Result<ChannelDetail, ClientError>;

    /// All server groups.
    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>, ClientError>;

    /// Server groups assigned to an account.
    async fn server_groups_of(&self, account: ClientDbId)
        -> Result<Vec<ServerGroupId>, ClientError>;

    /// Resolve a channel by its exact name.
    async fn find_channel(&self, name: &str) -> Result<ChannelId, ClientError>;

    /// Move a client into a channel.
    async fn move_client(&self, client: ClientId, to: ChannelId) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_accessor() {
        let err = ClientError::Rejected {
            reason: RejectReason::DestinationFull,
            code: 777,
            message: "channel maxclient reached".to_string(),
        };
        assert_eq!(err.reject_reason(), Some(RejectReason::DestinationFull));
        assert!(err.to_string().contains("destination_full"));

        let err = ClientError::ChannelNotFound("AFK".to_string());
        assert_eq!(err.reject_reason(), None);
    }
}
