//! Error types for the query protocol.

use thiserror::Error;

/// Errors raised while talking to a query interface.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The server answered with a non-zero status.
    #[error("server error {id}: {message}")]
    Server { id: u32, message: String },

    /// A record lacks a field the caller requires.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A field could not be parsed into the expected type.
    #[error("invalid value for '{key}': '{value}'")]
    InvalidField { key: String, value: String },

    /// The server sent something that is not valid protocol.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    Closed,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// The server status code, if this error came from the server.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            QueryError::Server { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Returns true if the connection is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueryError::Closed | QueryError::Io(_))
    }
}
