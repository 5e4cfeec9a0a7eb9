//! MCP-backed tool session.

use super::{
    ResourceDescriptor, SessionConnector, ToolDescriptor, ToolError, ToolResult, ToolSession,
};
use crate::Error;
use mcp::{CallToolResult, Session, SessionConfig};
use serde_json::{Map, Value};

impl From<mcp::Error> for ToolError {
    fn from(err: mcp::Error) -> Self {
        match err {
            mcp::Error::ToolCallFailed(text) => ToolError::Failed(text),
            mcp::Error::JsonRpc(e) => ToolError::Failed(e.to_string()),
            other => ToolError::Transport(other.to_string()),
        }
    }
}

impl ToolSession for Session {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let tools = Session::list_tools(self).await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ToolError> {
        let resources = Session::list_resources(self).await?;
        Ok(resources.into_iter().map(ResourceDescriptor::from).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        let result = Session::call_tool(self, name, Some(arguments.clone())).await?;
        tool_result(result)
    }

    async fn close(&self) {
        Session::close(self).await;
    }
}

/// Content blocks, or the structured content when there are no blocks.
fn tool_result(result: CallToolResult) -> Result<ToolResult, ToolError> {
    if result.content.is_empty()
        && let Some(structured) = result.structured_content
    {
        return Ok(ToolResult {
            content: structured,
        });
    }

    let content = serde_json::to_value(&result.content)
        .map_err(|e| ToolError::Failed(format!("serialize result: {e}")))?;
    Ok(ToolResult { content })
}

impl SessionConnector<Session> {
    /// Connect to an MCP server over HTTP+SSE and fetch its listings.
    pub async fn connect(config: SessionConfig) -> crate::Result<Self> {
        let session = Session::connect(config)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Self::attach(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::JsonRpcError;
    use serde_json::json;

    fn call_result(value: Value) -> CallToolResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn server_reported_failures_map_to_failed() {
        let err = ToolError::from(mcp::Error::ToolCallFailed("Cannot divide by zero".into()));
        assert!(matches!(&err, ToolError::Failed(text) if text == "Cannot divide by zero"));

        let rpc = JsonRpcError {
            code: -32602,
            message: "Unknown tool: nope".into(),
            data: None,
        };
        let err = ToolError::from(mcp::Error::JsonRpc(rpc));
        assert!(matches!(&err, ToolError::Failed(text) if text == "[-32602] Unknown tool: nope"));
    }

    #[test]
    fn transport_failures_map_to_transport() {
        assert!(matches!(
            ToolError::from(mcp::Error::Disconnected),
            ToolError::Transport(_)
        ));
        assert!(matches!(
            ToolError::from(mcp::Error::Timeout("tools/call".into())),
            ToolError::Transport(_)
        ));
    }

    #[test]
    fn text_content_renders_as_text() {
        let result = tool_result(call_result(json!({
            "content": [{"type": "text", "text": "5"}]
        })))
        .unwrap();
        assert_eq!(result.to_string(), "5");
    }

    #[test]
    fn structured_content_used_when_no_blocks() {
        let result = tool_result(call_result(json!({
            "structuredContent": {"result": 5.0}
        })))
        .unwrap();
        assert_eq!(result.content, json!({"result": 5.0}));
        assert_eq!(result.to_string(), r#"{"result":5.0}"#);
    }

    #[test]
    fn blocks_win_over_structured_content() {
        let result = tool_result(call_result(json!({
            "content": [{"type": "text", "text": "5"}],
            "structuredContent": {"result": 5}
        })))
        .unwrap();
        assert_eq!(result.to_string(), "5");
    }
}
