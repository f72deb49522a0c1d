//! # idlemover-id
//!
//! Typed identifiers for the objects a voice server exposes over its query
//! interface.
//!
//! ## Design Principles
//!
//! - Every id is a plain unsigned number on the wire
//! - Ids are typed so a channel id can never be passed where a client id is
//!   expected
//! - Each id type knows the query-protocol key it is transmitted under
//!   (`clid`, `cldbid`, `cid`, `sgid`)
//!
//! Client ids (`clid`) are per-connection and get reused after a client
//! leaves; database ids (`cldbid`) identify the account and are stable.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
