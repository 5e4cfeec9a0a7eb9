//! Completion-service providers.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its API.

mod openai;

pub use openai::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder,
};
