//! Error types for the core library.

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid member identity or record.
    #[error("invalid member: {0}")]
    InvalidMember(String),
    /// Invalid ring configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
