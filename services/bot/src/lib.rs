//! Idle Mover
//!
//! Moves voice clients that have been idle for too long into a holding
//! channel and moves them back to where they were once they are active
//! again.
//!
//! ## Architecture
//!
//! - **Controller**: Starts and stops the mover; at most one worker runs
//! - **Worker**: Runs one reconciliation pass per check interval
//! - **Reconciler**: Snapshot, return phase, then relocation phase
//! - **Tracking Store**: Which clients the mover put in holding, and from where
//! - **Session Client**: Abstracts the voice server (query protocol in prod,
//!   mock in tests)
//!
//! The tracking store is shared with the disconnect handler. Every per-client
//! step of a pass holds its lock, so the two never interleave.

pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod events;
pub mod groups;
pub mod mock;
pub mod mover;
pub mod reconciler;
pub mod restore;
pub mod serverquery;
pub mod snapshot;
pub mod tracking;
pub mod worker;

pub use client::{ClientError, RejectReason, SessionClient};
pub use config::{Config, MoverConfig};
pub use controller::{Controller, StartError, StartOutcome, StopOutcome};
pub use reconciler::{IdleReconciler, TickReport};
pub use tracking::TrackingStore;
