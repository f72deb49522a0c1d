//! Idle and return classification.
//!
//! Both classifiers are pure reads of one snapshot entry plus static policy.
//! Group exclusion needs a server round-trip per client and is applied by the
//! caller on top of [`IdleVerdict::Relocate`].

use std::time::Duration;

use idlemover_id::ChannelId;

use crate::model::{ChannelDetail, Participant};

/// Static inputs to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    /// Idle time a client must exceed to be moved.
    pub threshold: Duration,

    /// The holding channel.
    pub holding: ChannelId,
}

impl IdlePolicy {
    /// Returns true if `idle` is strictly above the threshold.
    pub fn is_idle(&self, idle: Duration) -> bool {
        idle > self.threshold
    }
}

/// Outcome of checking one client for relocation to the holding channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleVerdict {
    /// Client should be moved to the holding channel.
    Relocate,

    /// Listing did not include the client's channel.
    MissingChannel,

    /// Listing did not include the client's idle time.
    MissingIdleTime,

    /// Client already sits in the holding channel.
    AlreadyHolding,

    /// Client has not been idle long enough.
    BelowThreshold,
}

impl IdleVerdict {
    /// Classify a single client.
    pub fn of(participant: &Participant, policy: &IdlePolicy) -> Self {
        let Some(channel) = participant.channel else {
            return Self::MissingChannel;
        };
        let Some(idle) = participant.idle else {
            return Self::MissingIdleTime;
        };

        if channel == policy.holding {
            Self::AlreadyHolding
        } else if !policy.is_idle(idle) {
            Self::BelowThreshold
        } else {
            Self::Relocate
        }
    }
}

/// Outcome of checking one client for a move back out of the holding channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnVerdict {
    /// Client is in the holding channel and active again.
    Restore,

    /// Listing did not include the client's channel.
    MissingChannel,

    /// Listing did not include the client's idle time.
    MissingIdleTime,

    /// Client is not in the holding channel.
    NotHolding,

    /// Client is still idle.
    StillIdle,
}

impl ReturnVerdict {
    /// Classify a single client.
    pub fn of(participant: &Participant, policy: &IdlePolicy) -> Self {
        let Some(channel) = participant.channel else {
            return Self::MissingChannel;
        };
        let Some(idle) = participant.idle else {
            return Self::MissingIdleTime;
        };

        if channel != policy.holding {
            Self::NotHolding
        } else if policy.is_idle(idle) {
            Self::StillIdle
        } else {
            Self::Restore
        }
    }
}

/// Result of the destination pre-check before moving a client back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Destination appears to accept the client.
    Admit,

    /// Destination is at its client limit.
    Full { occupancy: u32, limit: u32 },

    /// Destination requires a password.
    PasswordProtected,
}

/// Check whether a destination will accept one more client.
///
/// `occupancy` is `None` when the channel was missing from the tick's channel
/// listing; only the password check applies then. This is a best-effort
/// check: occupancy can change before the move is issued.
pub fn check_admission(detail: &ChannelDetail, occupancy: Option<u32>) -> Admission {
    if let (Some(occupancy), crate::ChannelLimit::Max(limit)) = (occupancy, detail.max_clients) {
        if detail.max_clients.is_reached(occupancy) {
            return Admission::Full { occupancy, limit };
        }
    }

    if detail.password_protected {
        return Admission::PasswordProtected;
    }

    Admission::Admit
}
