use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("not connected to a tool server")]
    NotConnected,

    #[error("{0}")]
    MissingCredential(String),

    #[error("tool {name} failed: {detail}")]
    ToolInvocation { name: String, detail: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Model(ModelError),
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::MissingCredential(hint) => Self::MissingCredential(hint),
            other => Self::Model(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
