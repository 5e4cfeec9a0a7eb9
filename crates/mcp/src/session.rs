//! MCP session over HTTP+SSE (connect, request routing, lifecycle).
//!
//! The server streams JSON-RPC messages to us over a long-lived
//! `text/event-stream` response. Its first `endpoint` event names the URL we
//! `POST` our own messages to. Responses come back on the stream, so a
//! background reader matches them to waiting callers by request id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListParams, ListResourcesResult,
    ListToolsResult, RequestId, Resource, Tool,
};

/// Default timeout for MCP operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = Arc<Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>>;

/// Configuration for an MCP session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// URL of the server's SSE stream (e.g. `http://localhost:8000/sse`).
    pub url: String,
    /// Bound on endpoint discovery and on each request.
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Where outbound messages are posted.
#[derive(Debug, Clone)]
struct Channel {
    http: reqwest::Client,
    endpoint: Url,
}

impl Channel {
    async fn post(&self, body: &impl Serialize) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("{status}: {body}")));
        }
        Ok(())
    }
}

/// A live, initialized connection to an MCP server.
pub struct Session {
    config: SessionConfig,
    channel: Channel,
    pending: Pending,
    reader: JoinHandle<()>,
    next_id: AtomicI64,
    closed: AtomicBool,
    server_info: Option<InitializeResult>,
}

impl Session {
    /// Open the event stream, discover the message endpoint and run the
    /// `initialize` handshake.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.url)))?;
        info!(url = %url, "connecting to MCP server");

        let http = reqwest::Client::new();
        let mut events = EventSource::new(http.get(url.clone()))
            .map_err(|_| Error::Transport("event stream request cannot be cloned".into()))?;

        let endpoint = match timeout(config.timeout, discover_endpoint(&mut events, &url)).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(e)) => {
                events.close();
                return Err(e);
            }
            Err(_) => {
                events.close();
                return Err(Error::Timeout("message endpoint".into()));
            }
        };
        debug!(endpoint = %endpoint, "message endpoint discovered");

        let channel = Channel { http, endpoint };
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_stream(events, pending.clone(), channel.clone()));

        let mut session = Self {
            config,
            channel,
            pending,
            reader,
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            server_info: None,
        };
        session.initialize().await?;
        Ok(session)
    }

    async fn initialize(&mut self) -> Result<()> {
        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        self.notify("notifications/initialized").await?;

        info!(
            server = %result.server_info.name,
            version = result.server_info.version.as_deref().unwrap_or("unknown"),
            protocol = %result.protocol_version,
            "MCP session initialized"
        );
        self.server_info = Some(result);
        Ok(())
    }

    /// Server info from the handshake.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// List all tools, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tools)
    }

    /// List all resources, following pagination cursors.
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListResourcesResult = self
                .request("resources/list", Some(ListParams { cursor }))
                .await?;
            resources.extend(page.resources);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(resources)
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as [`Error::ToolCallFailed`]
    /// carrying the server's text.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the stream reader and fail any outstanding requests.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reader.abort();
        fail_pending(&self.pending).await;
        info!(url = %self.config.url, "MCP session closed");
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else if self.reader.is_finished() {
            Err(Error::Disconnected)
        } else {
            Ok(())
        }
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.ensure_open()?;

        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        debug!(%id, method, "sending request");
        if let Err(e) = self.channel.post(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match timeout(self.config.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(Error::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::Timeout(method.to_string()));
            }
        };

        let value = response.into_result()?;
        serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.ensure_open()?;
        self.channel.post(&JsonRpcNotification::new(method)).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Resolve the `endpoint` event's data against the stream URL.
pub(crate) fn resolve_endpoint(base: &Url, data: &str) -> Result<Url> {
    let data = data.trim();
    if data.is_empty() {
        return Err(Error::NoEndpoint);
    }
    base.join(data)
        .map_err(|e| Error::InvalidResponse(format!("bad endpoint {data:?}: {e}")))
}

async fn discover_endpoint(events: &mut EventSource, base: &Url) -> Result<Url> {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => debug!("event stream opened"),
            Ok(Event::Message(message)) if message.event == "endpoint" => {
                return resolve_endpoint(base, &message.data);
            }
            Ok(Event::Message(message)) => {
                debug!(event = %message.event, "ignoring event before endpoint")
            }
            Err(e) => return Err(Error::Transport(e.to_string())),
        }
    }
    Err(Error::NoEndpoint)
}

async fn read_stream(mut events: EventSource, pending: Pending, channel: Channel) {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "message" => {
                dispatch(&message.data, &pending, &channel).await;
            }
            Ok(Event::Message(message)) => {
                debug!(event = %message.event, "ignoring event")
            }
            Err(e) => {
                warn!(error = %e, "event stream ended");
                break;
            }
        }
    }
    events.close();
    fail_pending(&pending).await;
}

/// Drop every waiting sender; each waiter then sees [`Error::Disconnected`].
async fn fail_pending(pending: &Pending) {
    pending.lock().await.clear();
}

async fn dispatch(data: &str, pending: &Pending, channel: &Channel) {
    let incoming = match Incoming::parse(data) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!(error = %e, "dropping unparseable server message");
            return;
        }
    };

    match incoming {
        Incoming::Response(response) => {
            let waiter = pending.lock().await.remove(&response.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => warn!(id = %response.id, "response for unknown request"),
            }
        }
        Incoming::Request { id, method } => {
            let reply = server_request_reply(id, &method);
            if let Err(e) = channel.post(&reply).await {
                warn!(method = %method, error = %e, "failed to answer server request");
            }
        }
        Incoming::Notification { method } => debug!(method = %method, "server notification"),
    }
}

/// Reply for a server-initiated request. Only `ping` is supported.
pub(crate) fn server_request_reply(id: RequestId, method: &str) -> JsonRpcResponse {
    if method == "ping" {
        JsonRpcResponse::success(id, Value::Object(Map::new()))
    } else {
        JsonRpcResponse::failure(id, JsonRpcError::method_not_found(method))
    }
}
