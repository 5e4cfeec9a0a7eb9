//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers over the
//! HTTP+SSE transport.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Session, SessionConfig};
//!
//! # async fn example() -> mcp::Result<()> {
//! let session = Session::connect(SessionConfig::new("http://localhost:8000/sse")).await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("name".into(), "Ada".into());
//! let result = session.call_tool("greet", Some(args)).await?;
//! println!("{}", result.text());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod session;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListResourcesResult, ListToolsResult,
    PROTOCOL_VERSION, RequestId, Resource, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use session::{DEFAULT_TIMEOUT, Session, SessionConfig};
