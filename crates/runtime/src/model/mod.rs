//! Completion-service protocol types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, FinishReason, FunctionSpec, Message, ModelRequest, ModelResponse, Role, ToolCall,
    ToolChoice, ToolSpec, Usage,
};
