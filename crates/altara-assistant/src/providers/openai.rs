//! OpenAI Assistants provider implementation
//!
//! This module implements [`AssistantBackend`] over the OpenAI Assistants v2
//! REST API (threads, messages, runs).
//! See: https://platform.openai.com/docs/api-reference/assistants
//!
//! # Example
//!
//! ```no_run
//! use altara_assistant::providers::OpenAIAssistantsClient;
//! use altara_assistant::{CancelToken, JobRunner, PollPolicy};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAIAssistantsClient::from_env()?;
//! let runner = JobRunner::new(Arc::new(client), "asst_abc123", PollPolicy::default());
//!
//! let outcome = runner.run("Summarize AAPL", &CancelToken::new()).await?;
//! if let Some(text) = outcome.text() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    AssistantBackend, AssistantError, MessageRole, Result, RunSnapshot, RunStatus, ThreadMessage,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

/// Configuration for the OpenAI Assistants client
#[derive(Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Per-request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads the API key from `OPENAI_API_KEY` and, if set, the base URL
    /// from `OPENAI_API_BASE`.
    pub fn from_env() -> Result<Self> {
        let api_key = altara_utils::env_var("OPENAI_API_KEY").ok_or_else(|| {
            AssistantError::ConfigurationError(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        let config = Self::new(api_key);
        Ok(match altara_utils::env_var("OPENAI_API_BASE") {
            Some(api_base) => config.with_api_base(api_base),
            None => config,
        })
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Client for the OpenAI Assistants API
pub struct OpenAIAssistantsClient {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIAssistantsClient {
    /// Create a client with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a client with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = self.authorized(builder).send().await?;
        let response = check_status(response, what).await?;
        response.json::<T>().await.map_err(|e| {
            AssistantError::UnexpectedResponse(format!("Failed to parse {what} response: {e}"))
        })
    }
}

/// Map non-success HTTP statuses to errors
async fn check_status(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();

    Err(match status.as_u16() {
        401 => AssistantError::AuthenticationFailed,
        404 => AssistantError::NotFound(format!("{what}: {error_text}")),
        429 => AssistantError::RateLimitExceeded(error_text),
        _ => AssistantError::RequestFailed(format!("{what} HTTP {status}: {error_text}")),
    })
}

#[async_trait]
impl AssistantBackend for OpenAIAssistantsClient {
    #[instrument(skip(self))]
    async fn create_thread(&self) -> Result<String> {
        let thread: ThreadObject = self
            .send(
                self.client.post(self.url("/threads")).json(&serde_json::json!({})),
                "create thread",
            )
            .await?;
        Ok(thread.id)
    }

    #[instrument(skip(self, content), fields(content_len = content.len()))]
    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let body = CreateMessageRequest {
            role: "user",
            content,
        };
        let _: MessageObject = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread_id}/messages")))
                    .json(&body),
                "create message",
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunSnapshot> {
        let body = CreateRunRequest { assistant_id };
        let run: RunObject = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread_id}/runs")))
                    .json(&body),
                "create run",
            )
            .await?;
        debug!(run_id = %run.id, status = %run.status, "run created");
        Ok(run.into_snapshot())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let run: RunObject = self
            .send(
                self.client
                    .get(self.url(&format!("/threads/{thread_id}/runs/{run_id}"))),
                "retrieve run",
            )
            .await?;
        Ok(run.into_snapshot())
    }

    #[instrument(skip(self))]
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let _: RunObject = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread_id}/runs/{run_id}/cancel"))),
                "cancel run",
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let list: MessageList = self
            .send(
                self.client
                    .get(self.url(&format!("/threads/{thread_id}/messages")))
                    .query(&[("order", "desc"), ("limit", "20")]),
                "list messages",
            )
            .await?;
        Ok(list.data.into_iter().map(MessageObject::into_message).collect())
    }

    #[instrument(skip(self))]
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let deleted: DeletionStatus = self
            .send(
                self.client
                    .delete(self.url(&format!("/threads/{thread_id}"))),
                "delete thread",
            )
            .await?;
        if !deleted.deleted {
            return Err(AssistantError::UnexpectedResponse(format!(
                "thread {thread_id} was not deleted"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// OpenAI-specific request types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

// ============================================================================
// OpenAI-specific response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    id: String,
    role: String,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    content: Vec<MessageContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct DeletionStatus {
    deleted: bool,
}

// ============================================================================
// Conversion functions
// ============================================================================

impl RunObject {
    fn into_snapshot(self) -> RunSnapshot {
        let last_error = match (self.last_error, self.incomplete_details) {
            (Some(err), _) => Some(format!("{}: {}", err.code, err.message)),
            (None, Some(details)) => details.reason.map(|r| format!("incomplete: {r}")),
            (None, None) => None,
        };
        RunSnapshot {
            id: self.id,
            thread_id: self.thread_id,
            status: RunStatus::from_api(&self.status),
            last_error,
        }
    }
}

impl MessageObject {
    fn into_message(self) -> ThreadMessage {
        let role = if self.role == "assistant" {
            MessageRole::Assistant
        } else {
            MessageRole::User
        };
        let text = self
            .content
            .into_iter()
            .filter_map(|part| match part {
                MessageContentPart::Text { text } => Some(text.value),
                MessageContentPart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        ThreadMessage {
            id: self.id,
            role,
            created_at: self.created_at,
            text,
        }
    }
}
