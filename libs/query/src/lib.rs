//! # idlemover-query
//!
//! Codec and connection for the line-based text query interface voice
//! servers expose for administration.
//!
//! ## Wire format
//!
//! - A command is one line: `name key=value -flag`
//! - A response is at most one data line followed by a status line
//!   `error id=<n> msg=<text>`; `id=0` means success
//! - Data lines hold records separated by `|`, each record a list of
//!   space-separated `key=value` pairs
//! - Lines starting with `notify` are unsolicited events and may arrive
//!   between any two lines of a response
//! - Values escape whitespace, `/`, `|` and `\` (see [`escape`])

mod codec;
mod connection;
mod error;

pub use codec::{
    escape, parse_record, parse_records, parse_status, unescape, Command, Notification, Record,
    Status,
};
pub use connection::Connection;
pub use error::QueryError;
