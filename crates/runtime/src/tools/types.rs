//! Tool-related types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A tool as advertised by the remote session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<mcp::Tool> for ToolDescriptor {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

/// A resource as advertised by the remote session. Opaque to the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
}

impl From<mcp::Resource> for ResourceDescriptor {
    fn from(resource: mcp::Resource) -> Self {
        Self {
            uri: resource.uri,
            name: resource.name,
        }
    }
}

/// The content a tool returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Value,
}

impl ToolResult {
    /// A result holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: json!([{ "type": "text", "text": text.into() }]),
        }
    }
}

/// Renders the content for the transcript: text blocks joined by newlines,
/// or the JSON content when there is no text.
impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.content {
            Value::String(text) => f.write_str(text),
            Value::Array(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                if texts.is_empty() {
                    write!(f, "{}", self.content)
                } else {
                    f.write_str(&texts.join("\n"))
                }
            }
            other => write!(f, "{other}"),
        }
    }
}
