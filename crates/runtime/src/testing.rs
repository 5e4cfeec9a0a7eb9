//! In-memory fakes for the session and backend seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, ToolChoice, ToolSpec,
    Usage,
};
use crate::tools::{ResourceDescriptor, ToolDescriptor, ToolError, ToolResult, ToolSession};

/// Tool session that records every call in order.
#[derive(Default)]
pub(crate) struct FakeSession {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    outcomes: HashMap<String, Result<ToolResult, ToolError>>,
    fail_listing: bool,
    calls: Arc<Mutex<Vec<(String, Map<String, Value>)>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_tool(mut self, name: &str, schema: Value) -> Self {
        self.tools.push(ToolDescriptor {
            name: name.into(),
            description: format!("{name} tool"),
            input_schema: schema,
        });
        self
    }

    pub(crate) fn with_resource(mut self, uri: &str, name: &str) -> Self {
        self.resources.push(ResourceDescriptor {
            uri: uri.into(),
            name: name.into(),
        });
        self
    }

    pub(crate) fn with_result(mut self, name: &str, result: ToolResult) -> Self {
        self.outcomes.insert(name.into(), Ok(result));
        self
    }

    pub(crate) fn with_failure(mut self, name: &str, error: ToolError) -> Self {
        self.outcomes.insert(name.into(), Err(error));
        self
    }

    pub(crate) fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Shared log of `(name, arguments)` in call order.
    pub(crate) fn call_log(&self) -> Arc<Mutex<Vec<(String, Map<String, Value>)>>> {
        self.calls.clone()
    }

    pub(crate) fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

impl ToolSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if self.fail_listing {
            return Err(ToolError::Transport("listing refused".into()));
        }
        Ok(self.tools.clone())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ToolError> {
        Ok(self.resources.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));

        match self.outcomes.get(name) {
            Some(outcome) => outcome.clone(),
            None if self.tools.iter().any(|t| t.name == name) => {
                Ok(ToolResult::text(format!("{name} ok")))
            }
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

/// Backend that replays scripted assistant messages and records requests.
pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<Message>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    has_credentials: bool,
}

impl ScriptedBackend {
    pub(crate) fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            has_credentials: true,
        }
    }

    pub(crate) fn without_credentials(mut self) -> Self {
        self.has_credentials = false;
        self
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    fn check_credentials(&self) -> Result<(), ModelError> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(ModelError::MissingCredential(
                "API key not set for scripted backend".into(),
            ))
        }
    }

    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request.tools.to_vec(),
            tool_choice: request.tool_choice,
        });

        let message = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::Api("no scripted response left".into()))?;

        let finish_reason = if message.has_tool_calls() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };

        Ok(ModelResponse {
            message,
            usage: Usage::default(),
            finish_reason,
        })
    }
}
