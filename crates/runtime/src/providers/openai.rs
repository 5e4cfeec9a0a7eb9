//! OpenAI-compatible chat completions backend.

use std::collections::HashSet;

use crate::model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCall,
    ToolChoice, ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiBackendBuilder {
    /// A blank or missing key is accepted here and reported per query.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> OpenAiBackend {
        OpenAiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn builder(api_key: Option<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn tool_call_to_api(call: &ToolCall) -> ApiToolCall {
        ApiToolCall {
            id: call.id.clone(),
            call_type: function_type(),
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments_json(),
            },
        }
    }

    /// Convert the transcript to wire messages.
    ///
    /// The wire format needs each tool result to follow the assistant message
    /// that requested it. When the messages right after an assistant message
    /// re-describe all of its calls, the calls are sent with those echoes and
    /// the requesting message keeps only its text (or is left out when it has none).
    fn messages_to_api(messages: &[Message]) -> Vec<ApiMessage> {
        let mut api_messages = Vec::with_capacity(messages.len());

        for (index, msg) in messages.iter().enumerate() {
            let echoed = msg.role == Role::Assistant
                && msg.has_tool_calls()
                && Self::is_echoed(msg, &messages[index + 1..]);

            if echoed && msg.text().is_empty() {
                continue;
            }

            let tool_calls = if echoed {
                Vec::new()
            } else {
                msg.tool_calls.iter().map(Self::tool_call_to_api).collect()
            };

            api_messages.push(ApiMessage {
                role: Self::role_to_api(msg.role),
                content: msg.content.clone(),
                tool_calls,
                tool_call_id: msg.tool_call_id.clone(),
            });
        }

        api_messages
    }

    fn is_echoed(msg: &Message, rest: &[Message]) -> bool {
        let Some(next) = rest.first() else {
            return false;
        };
        if next.role != Role::Assistant || !next.has_tool_calls() {
            return false;
        }

        let echoed_ids: HashSet<&str> = rest
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| &m.tool_calls)
            .map(|call| call.id.as_str())
            .collect();

        msg.tool_calls
            .iter()
            .all(|call| echoed_ids.contains(call.id.as_str()))
    }

    /// `tool_choice` is only valid alongside a non-empty `tools` list.
    fn request_to_api<'a>(&'a self, request: &ModelRequest<'a>) -> ApiRequest<'a> {
        let tool_choice = request.tool_choice.filter(|_| !request.tools.is_empty());
        ApiRequest {
            model: &self.model,
            messages: Self::messages_to_api(request.messages),
            tools: request.tools,
            tool_choice,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn tool_call_from_api(call: ApiToolCall) -> Result<ToolCall, ModelError> {
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(ModelError::InvalidResponse(format!(
                        "arguments for {} are not an object: {other}",
                        call.function.name
                    )));
                }
                Err(e) => {
                    return Err(ModelError::InvalidResponse(format!(
                        "arguments for {} are not valid JSON: {e}",
                        call.function.name
                    )));
                }
            }
        };

        Ok(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        })
    }

    fn response_to_model(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(Self::tool_call_from_api)
            .collect::<Result<Vec<_>, _>>()?;

        let message = Message::assistant_with_tool_calls(choice.message.content, tool_calls);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from)
            .unwrap_or_default();

        Ok(ModelResponse {
            message,
            usage,
            finish_reason,
        })
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({}, {})", self.model, self.base_url)
    }
}

impl Backend for OpenAiBackend {
    fn check_credentials(&self) -> Result<(), ModelError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(ModelError::MissingCredential(format!(
                "{API_KEY_ENV} environment variable not set. \
                 Please create a .env file with your API key."
            ))),
        }
    }

    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.check_credentials()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let api_request = self.request_to_api(&request);

        info!(
            model = %self.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let response = Self::response_to_model(api_response)?;
        debug!(
            tool_calls = response.message.tool_calls.len(),
            total_tokens = response.usage.total_tokens(),
            "chat completion received"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FunctionSpec;
    use serde_json::json;

    fn add_call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "add".into(),
            arguments: json!({"a": 2, "b": 3}).as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn blank_key_is_missing_credential() {
        let backend = OpenAiBackend::builder(Some("  ".into()), DEFAULT_MODEL).build();
        let err = backend.check_credentials().unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential(_)));
        assert!(err.to_string().contains(API_KEY_ENV));

        let backend = OpenAiBackend::builder(Some("sk-test".into()), DEFAULT_MODEL).build();
        assert!(backend.check_credentials().is_ok());
    }

    #[tokio::test]
    async fn call_without_key_fails_before_network() {
        // Unroutable base URL: reaching the network would surface as Network.
        let backend = OpenAiBackend::builder(None, DEFAULT_MODEL)
            .base_url("http://127.0.0.1:9")
            .build();
        let request = ModelRequest {
            messages: &[Message::user("hi")],
            tools: &[],
            tool_choice: None,
        };
        let err = backend.call(request).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential(_)));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let backend = OpenAiBackend::builder(None, "gpt-4o")
            .base_url("http://localhost:11434/v1/")
            .build();
        assert_eq!(backend.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(backend.to_string(), "openai(gpt-4o, http://localhost:11434/v1/)");
    }

    #[test]
    fn request_includes_tools_only_when_offered() {
        let backend = OpenAiBackend::builder(Some("sk-test".into()), DEFAULT_MODEL).build();
        let specs = vec![ToolSpec::Function {
            function: FunctionSpec {
                name: "add".into(),
                description: "Add two numbers".into(),
                parameters: json!({"type": "object"}),
            },
        }];
        let messages = [Message::system("sys"), Message::user("add 2 and 3")];

        let with_tools = ModelRequest {
            messages: &messages,
            tools: &specs,
            tool_choice: Some(ToolChoice::Auto),
        };
        let json = serde_json::to_value(backend.request_to_api(&with_tools)).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "add");
        assert_eq!(json["messages"][0], json!({"role": "system", "content": "sys"}));

        let without_tools = ModelRequest {
            messages: &messages,
            tools: &[],
            tool_choice: None,
        };
        let json = serde_json::to_value(backend.request_to_api(&without_tools)).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn tool_choice_is_dropped_without_tools() {
        let backend = OpenAiBackend::builder(Some("sk-test".into()), DEFAULT_MODEL).build();
        let messages = [Message::user("hello")];
        let request = ModelRequest {
            messages: &messages,
            tools: &[],
            tool_choice: Some(ToolChoice::Auto),
        };

        let json = serde_json::to_value(backend.request_to_api(&request)).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn echoed_tool_calls_are_sent_next_to_their_results() {
        let messages = vec![
            Message::system("sys"),
            Message::user("add"),
            Message::assistant_with_tool_calls(None, vec![add_call("c1")]),
            Message::tool_call_echo(&add_call("c1")),
            Message::tool_result("c1", "5"),
        ];

        let api = OpenAiBackend::messages_to_api(&messages);
        let roles: Vec<_> = api.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool"]);

        let json = serde_json::to_value(&api[2]).unwrap();
        assert_eq!(
            json,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "c1",
                    "type": "function",
                    "function": {"name": "add", "arguments": "{\"a\":2,\"b\":3}"}
                }]
            })
        );
        assert_eq!(api[3].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn echoed_request_keeps_its_text() {
        let messages = vec![
            Message::assistant_with_tool_calls(Some("Adding.".into()), vec![add_call("c1")]),
            Message::tool_call_echo(&add_call("c1")),
            Message::tool_result("c1", "5"),
        ];

        let api = OpenAiBackend::messages_to_api(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].content.as_deref(), Some("Adding."));
        assert!(api[0].tool_calls.is_empty());
        assert_eq!(api[1].tool_calls.len(), 1);
    }

    #[test]
    fn unechoed_tool_calls_are_kept() {
        let messages = vec![Message::assistant_with_tool_calls(None, vec![add_call("c1")])];
        let api = OpenAiBackend::messages_to_api(&messages);
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].tool_calls[0].function.name, "add");
    }

    #[test]
    fn response_with_tool_calls() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "add", "arguments": "{\"a\": 2, \"b\": 3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 10, "total_tokens": 60}
        });
        let response: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = OpenAiBackend::response_to_model(response).unwrap();

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.total_tokens(), 60);
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.text(), "");
        assert_eq!(response.message.tool_calls, vec![add_call("call_abc")]);
    }

    #[test]
    fn response_text_only() {
        let raw = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello!", "tool_calls": null},
                "finish_reason": "stop"
            }]
        });
        let response: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = OpenAiBackend::response_to_model(response).unwrap();
        assert_eq!(response.message.text(), "Hello!");
        assert!(!response.message.has_tool_calls());
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let raw = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "c1",
                        "type": "function",
                        "function": {"name": "add", "arguments": "[1, 2]"}
                    }]
                }
            }]
        });
        let response: ApiResponse = serde_json::from_value(raw).unwrap();
        let err = OpenAiBackend::response_to_model(response).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn empty_choices_are_rejected() {
        let response: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(OpenAiBackend::response_to_model(response).is_err());
    }
}
