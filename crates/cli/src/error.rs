//! CLI error types.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A direct command had the right shape but unusable values.
    ///
    /// Rejected before anything is sent to the tool server.
    #[error("{0}")]
    MalformedArgument(String),

    /// A direct command was called with the wrong number of arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
