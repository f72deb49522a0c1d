//! Snapshot model of a voice server, as read at the start of a tick.

use std::time::Duration;

use idlemover_id::{ChannelId, ClientDbId, ClientId, ServerGroupId};
use serde::{Deserialize, Serialize};

/// What kind of connection a client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// A regular voice client operated by a person.
    Voice,

    /// A query (management/bot) connection.
    Query,
}

impl ClientKind {
    /// Map the protocol's `client_type` field.
    pub fn from_raw(raw: i64) -> Self {
        if raw == 1 {
            Self::Query
        } else {
            Self::Voice
        }
    }
}

/// A connected client.
///
/// `channel` and `idle` are optional because the server may omit fields from
/// a listing; classifiers skip such records rather than guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ClientId,
    pub database_id: ClientDbId,
    pub channel: Option<ChannelId>,
    pub idle: Option<Duration>,
    pub kind: ClientKind,
    pub nickname: String,
}

impl Participant {
    /// Returns true for voice clients.
    pub fn is_human(&self) -> bool {
        self.kind == ClientKind::Voice
    }
}

/// A channel from the channel listing, with its current occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub total_clients: u32,
}

/// Maximum number of clients a channel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLimit {
    Unlimited,
    Max(u32),
}

impl ChannelLimit {
    /// Map the protocol's `channel_maxclients` field, where -1 (or any
    /// negative value) means unlimited.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::Max(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Returns true if `occupancy` clients already fill the channel.
    pub fn is_reached(&self, occupancy: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Max(max) => occupancy >= *max,
        }
    }
}

/// Per-channel settings relevant to moving a client into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDetail {
    pub max_clients: ChannelLimit,
    pub password_protected: bool,
}

/// A server group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroup {
    pub id: ServerGroupId,
    pub name: String,
}
