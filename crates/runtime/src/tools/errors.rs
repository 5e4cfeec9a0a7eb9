use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to a tool session.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The tool ran and reported an error; carries the server's payload.
    #[error("{0}")]
    Failed(String),
    #[error("transport: {0}")]
    Transport(String),
}
