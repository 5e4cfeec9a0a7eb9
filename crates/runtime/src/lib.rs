//! Skiff runtime: query orchestration over a tool server and a completion
//! service.
//!
//! # Overview
//!
//! - **SessionConnector**: owns the tool-server session and the tool and
//!   resource listings captured at connect time.
//! - **Backend**: a trait abstracting chat-completion providers.
//! - **Orchestrator**: runs one query through at most one round of tool calls.
//!
//! # Example
//!
//! ```ignore
//! use mcp::SessionConfig;
//! use runtime::{OpenAiBackend, Orchestrator, SessionConnector};
//!
//! # async fn example() -> runtime::Result<()> {
//! let mut connector = SessionConnector::connect(SessionConfig::new("http://localhost:8000/sse")).await?;
//! let backend = OpenAiBackend::builder(std::env::var("OPENAI_API_KEY").ok(), "gpt-4").build();
//! let orchestrator = Orchestrator::new(backend);
//!
//! let answer = orchestrator.process(&connector, "What is 2 + 3?").await?;
//! println!("{answer}");
//! connector.close().await;
//! # Ok(())
//! # }
//! ```

mod conversation;
mod error;
pub mod model;
mod orchestrator;
pub mod providers;
#[cfg(test)]
mod testing;
pub mod tools;

pub use conversation::ConversationState;
pub use error::{Error, Result};
pub use orchestrator::{DEFAULT_SYSTEM_PROMPT, Orchestrator, ToolErrorPolicy};

// Completion-service types
pub use model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCall,
    ToolChoice, ToolSpec, Usage,
};
pub use providers::{OpenAiBackend, OpenAiBackendBuilder};

// Tool session types
pub use tools::{
    ResourceDescriptor, SessionConnector, ToolCatalog, ToolDescriptor, ToolError, ToolResult,
    ToolSession,
};
