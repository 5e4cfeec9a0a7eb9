//! Session connector: owns the tool session handle and its tool listing.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::tools::{ResourceDescriptor, ToolCatalog, ToolDescriptor, ToolResult, ToolSession};
use crate::{Error, Result};

/// Owns the handle to a tool session for the lifetime of one connection.
///
/// The tool listing is fetched once, when the handle is attached. Queries
/// receive the connector by reference; nothing about the session is global.
pub struct SessionConnector<S> {
    handle: Option<S>,
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

impl<S: ToolSession> SessionConnector<S> {
    /// A connector with no session. Every query fails with
    /// [`Error::NotConnected`].
    pub fn disconnected() -> Self {
        Self {
            handle: None,
            tools: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Take ownership of a live session and fetch its listings.
    ///
    /// The session is closed again if the tool listing fails.
    pub async fn attach(handle: S) -> Result<Self> {
        let tools = match handle.list_tools().await {
            Ok(tools) => dedup_by_name(tools),
            Err(e) => {
                handle.close().await;
                return Err(Error::Connection(format!("failed to list tools: {e}")));
            }
        };

        let resources = handle.list_resources().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to list resources");
            Vec::new()
        });

        info!(
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "connected to server with tools"
        );
        info!(
            resources = ?resources.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "available resources"
        );

        Ok(Self {
            handle: Some(handle),
            tools,
            resources,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// The live session handle.
    pub fn handle(&self) -> Result<&S> {
        self.handle.as_ref().ok_or(Error::NotConnected)
    }

    /// Tools from the last listing, unique by name.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Function specs for the current listing.
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog::from_descriptors(&self.tools)
    }

    /// Invoke a tool on the live session.
    pub async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolResult> {
        let handle = self.handle()?;
        handle
            .call_tool(name, arguments)
            .await
            .map_err(|e| Error::ToolInvocation {
                name: name.to_string(),
                detail: e.to_string(),
            })
    }

    /// Release the session. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close().await;
        }
        self.tools.clear();
        self.resources.clear();
    }
}

/// Keep the first descriptor for each name.
fn dedup_by_name(tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| {
            let fresh = seen.insert(tool.name.clone());
            if !fresh {
                warn!(tool = %tool.name, "duplicate tool name in listing, keeping the first");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSession;
    use crate::tools::ToolError;
    use serde_json::json;

    #[tokio::test]
    async fn attach_fetches_and_dedups_listing() {
        let session = FakeSession::new()
            .with_tool("greet", json!({"type": "object"}))
            .with_tool("calculate", json!({"type": "object"}))
            .with_tool("greet", json!({"type": "object", "title": "second"}))
            .with_resource("example://calculator", "calculator_resource");

        let connector = SessionConnector::attach(session).await.unwrap();
        let names: Vec<_> = connector.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["greet", "calculate"]);
        assert_eq!(connector.tools()[0].input_schema, json!({"type": "object"}));
        assert_eq!(connector.resources()[0].name, "calculator_resource");
        assert_eq!(connector.catalog().len(), 2);
    }

    #[tokio::test]
    async fn attach_closes_session_when_listing_fails() {
        let session = FakeSession::new().failing_listing();
        let closes = session.close_counter();

        let result = SessionConnector::attach(session).await;
        assert!(matches!(result, Err(Error::Connection(_))));
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnected_connector_rejects_calls() {
        let connector = SessionConnector::<FakeSession>::disconnected();
        assert!(!connector.is_connected());
        assert!(matches!(connector.handle(), Err(Error::NotConnected)));
        assert!(matches!(
            connector.call_tool("greet", &Map::new()).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn tool_failure_carries_remote_payload() {
        let session = FakeSession::new()
            .with_tool("calculate", json!({}))
            .with_failure("calculate", ToolError::Failed("Cannot divide by zero".into()));
        let connector = SessionConnector::attach(session).await.unwrap();

        let err = connector.call_tool("calculate", &Map::new()).await.unwrap_err();
        match err {
            Error::ToolInvocation { name, detail } => {
                assert_eq!(name, "calculate");
                assert_eq!(detail, "Cannot divide by zero");
            }
            other => panic!("expected tool invocation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = FakeSession::new().with_tool("greet", json!({}));
        let closes = session.close_counter();
        let mut connector = SessionConnector::attach(session).await.unwrap();

        connector.close().await;
        connector.close().await;

        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!connector.is_connected());
        assert!(connector.tools().is_empty());
    }
}
