//! Reconciliation primitives for moving idle clients.
//!
//! This library holds the pure half of the idle mover: the snapshot model
//! and the decisions taken over it. Nothing here performs I/O.
//!
//! - **Snapshot**: the clients connected at the start of a tick.
//! - **Idle verdict**: whether a client should be relocated to the holding
//!   channel.
//! - **Return verdict**: whether a client sitting in the holding channel is
//!   active again.
//! - **Admission**: whether a destination channel will accept one more
//!   client.
//!
//! # Invariants
//!
//! - Verdicts are deterministic given the same snapshot and policy
//! - A client in the holding channel is never a relocation candidate
//! - Idle time exactly at the threshold is not idle (strictly greater-than)

mod classify;
mod model;

pub use classify::{check_admission, Admission, IdlePolicy, IdleVerdict, ReturnVerdict};
pub use model::{Channel, ChannelDetail, ChannelLimit, ClientKind, Participant, ServerGroup};

use std::time::Duration;

/// Default interval between reconciliation passes.
pub const DEFAULT_CHECK_FREQUENCY: Duration = Duration::from_secs(30);

/// Default idle time after which a client is moved.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(600);

/// Default name of the holding channel.
pub const DEFAULT_HOLDING_CHANNEL: &str = "AFK";
