//! Tool sessions, the session connector and the function-calling catalog.

mod catalog;
mod connector;
pub mod errors;
mod mcp_host;
mod r#trait;
mod types;

pub use catalog::ToolCatalog;
pub use connector::SessionConnector;
pub use errors::ToolError;
pub use r#trait::ToolSession;
pub use types::{ResourceDescriptor, ToolDescriptor, ToolResult};
