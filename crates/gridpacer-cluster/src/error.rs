//! Error types for the cluster interface.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur talking to the cluster master or interpreting
/// what it said.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("connection to master failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("master returned status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("malformed cluster report: {0}")]
    Malformed(String),
}
