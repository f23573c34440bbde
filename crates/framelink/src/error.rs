// Error types for framelink

use thiserror::Error;

/// Result type alias for framelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using framelink
#[derive(Debug, Error)]
pub enum Error {
    /// The instance id is not registered on the remote side
    #[error("{0}")]
    RemoteNotFound(String),

    /// The instance exists remotely but the method name does not resolve
    #[error("{0}")]
    MethodNotFound(String),

    /// The invoked method raised, or its returned future failed
    #[error("Remote method failed: {message}")]
    RemoteThrew {
        message: String,
        name: Option<String>,
        stack: Option<String>,
    },

    /// No response arrived within the channel's configured call timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Channel closed before a response arrived
    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    /// Transport-level error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Strict registration found the instance id already taken
    #[error("Instance id '{0}' is already registered")]
    DuplicateInstance(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
