//! Tool session trait.

use crate::tools::{ResourceDescriptor, ToolDescriptor, ToolError, ToolResult};
use serde_json::{Map, Value};
use std::future::Future;

/// A live connection to a tool-hosting server.
///
/// This is the boundary between the orchestration loop and side effects;
/// tests substitute in-memory fakes.
pub trait ToolSession: Send + Sync {
    /// List the tools the server exposes, in server order.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDescriptor>, ToolError>> + Send;

    /// List the resources the server exposes.
    fn list_resources(
        &self,
    ) -> impl Future<Output = Result<Vec<ResourceDescriptor>, ToolError>> + Send;

    /// Invoke a tool.
    fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> impl Future<Output = Result<ToolResult, ToolError>> + Send;

    /// Release transport resources. Must be idempotent.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
