//! Query orchestration: one completion, optional tool round, one follow-up.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationState;
use crate::model::{Backend, Message, ModelRequest, ToolChoice, ToolSpec};
use crate::tools::{SessionConnector, ToolSession};
use crate::{Error, Result};

/// System preamble used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that can use tools to help users accomplish tasks.";

/// What to do when a tool call in a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolErrorPolicy {
    /// Stop at the first failure and return it. No follow-up completion.
    #[default]
    Abort,
    /// Report the failure to the model, run the remaining calls, and list
    /// the failures after the answer.
    Continue,
}

/// Drives a single query through the completion service and tool session.
///
/// At most one round of tool execution happens per query: the follow-up
/// completion is sent without tool specs, so the model cannot chain calls.
pub struct Orchestrator<B> {
    backend: B,
    system_prompt: String,
    on_tool_error: ToolErrorPolicy,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            on_tool_error: ToolErrorPolicy::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_tool_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.on_tool_error = policy;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Answer `query`, calling tools on `connector` if the model asks for them.
    ///
    /// Returns the non-empty texts of the first and (if tools ran) the final
    /// completion, joined by a newline.
    pub async fn process<S: ToolSession>(
        &self,
        connector: &SessionConnector<S>,
        query: &str,
    ) -> Result<String> {
        // Seed. Both checks happen before any network call.
        connector.handle()?;
        self.backend.check_credentials()?;
        let mut conversation = ConversationState::seed(&self.system_prompt, query);
        let catalog = connector.catalog();

        // First completion, tools offered when the server has any.
        info!(tools = catalog.len(), "sending query to model");
        let tool_choice = (!catalog.is_empty()).then_some(ToolChoice::Auto);
        let first = self
            .complete(&conversation, catalog.specs(), tool_choice)
            .await?;
        let mut output = vec![first.text().to_string()];
        let calls = first.tool_calls.clone();
        conversation.append_assistant(first)?;

        if calls.is_empty() {
            return Ok(join_output(&output));
        }

        // Tool execution, strictly in the order the model listed the calls.
        let mut failures = Vec::new();
        for call in &calls {
            info!(
                tool = %call.name,
                id = %call.id,
                arguments = %call.arguments_json(),
                "model is calling tool"
            );
            let content = match connector.call_tool(&call.name, &call.arguments).await {
                Ok(result) => result.to_string(),
                Err(Error::ToolInvocation { name, detail })
                    if self.on_tool_error == ToolErrorPolicy::Continue =>
                {
                    warn!(tool = %name, error = %detail, "tool call failed, continuing");
                    failures.push(format!("tool {name} failed: {detail}"));
                    format!("error: {detail}")
                }
                Err(err) => return Err(err),
            };
            debug!(tool = %call.name, result = %content, "tool returned");
            conversation.append_assistant(Message::tool_call_echo(call))?;
            conversation.append_tool_result(&call.id, content)?;
        }

        // Final completion, no tools offered.
        info!("getting final response from model");
        let last = self.complete(&conversation, &[], None).await?;
        output.push(last.text().to_string());
        conversation.append_assistant(last)?;

        output.extend(failures);
        Ok(join_output(&output))
    }

    /// Like [`process`](Self::process), but renders errors as response text.
    pub async fn respond<S: ToolSession>(
        &self,
        connector: &SessionConnector<S>,
        query: &str,
    ) -> String {
        match self.process(connector, query).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "query failed");
                format!("Error: {e}")
            }
        }
    }

    async fn complete(
        &self,
        conversation: &ConversationState,
        tools: &[ToolSpec],
        tool_choice: Option<ToolChoice>,
    ) -> Result<Message> {
        let request = ModelRequest {
            messages: conversation.messages(),
            tools,
            tool_choice,
        };
        let response = self.backend.call(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            finish_reason = ?response.finish_reason,
            "completion received"
        );
        Ok(response.message)
    }
}

fn join_output(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}
