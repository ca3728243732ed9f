//! LLM-backed solver agents for the Connections word-grouping puzzle.
//!
//! `connections-agents` plays the puzzle (sixteen words, four hidden
//! categories of four) by talking to any OpenAI-compatible chat completions
//! endpoint. The interesting part is the
//! [`ConsensusSolver`](solver::consensus::ConsensusSolver): three model-backed
//! roles negotiate a guess before it is submitted.
//!
//! 1. The **proposer** suggests a group of words and a category name.
//! 2. The **validator** is shown only the category and picks its own group.
//! 3. The **consensus checker** compares the two groups.
//!
//! Disagreements are written into a
//! [`FeedbackLedger`](solver::ledger::FeedbackLedger) that is rendered into
//! every later prompt, so rejected pairings are not proposed again. The loop
//! is bounded by [`ConsensusConfig::max_attempts`](solver::consensus::ConsensusConfig).
//!
//! # Getting started
//!
//! ```ignore
//! use connections_agents::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let preset = EndpointPreset::parse("groq");
//!     let client = EndpointClient::from_preset(&preset)?;
//!
//!     let config = SolverConfig::new("llama-3.3-70b-versatile").with_max_attempts(10);
//!     let mut solver = config.build_consensus_solver(Arc::new(client));
//!
//!     let mut board = sample_board();
//!     let record = Runner::new(&config).play("sample", &mut board, &mut solver, &LoggingHandler).await;
//!     println!("{}", record.metrics.summary());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Endpoint presets, retry with backoff, per-role model routing, token accounting |
//! | [`game`] | Puzzle [`Board`](game::Board), categories, archive loading |
//! | [`solver`] | [`Solver`](solver::Solver) trait, consensus and single-shot solvers, reply parsing, events |
//! | [`prompt`] | Prompt templates with `{{placeholder}}` rendering and on-disk overrides |
//! | [`metrics`] | Per-game scoring and run summaries |
//! | [`runner`] | Drives one game from first guess to game over |
//! | [`store`] | JSONL result records |

pub mod api;
pub mod config;
pub mod game;
pub mod metrics;
pub mod prelude;
pub mod prompt;
pub mod runner;
pub mod solver;
pub mod store;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

/// Path of the chat completions route, relative to an endpoint's base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

/// Default model for every role.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default completion budget per model call. Replies are a few lines.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body (OpenAI-compatible subset). Unused optional
/// fields are omitted from serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

impl ChatRequest {
    /// A system + user exchange, the only shape the solvers send.
    pub fn exchange(model: impl Into<String>, system: &str, user: &str) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
            max_tokens: DEFAULT_MAX_TOKENS,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
    model: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

/// Providers disagree on whether `error` is an object or a bare string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ApiErrorResponse {
    Object { message: String },
    Text(String),
}

impl ApiErrorResponse {
    fn message(&self) -> &str {
        match self {
            ApiErrorResponse::Object { message } => message,
            ApiErrorResponse::Text(text) => text,
        }
    }
}

/// Clean return type from [`ChatBackend::chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
    /// Model name echoed by the provider, when it sends one.
    pub model: Option<String>,
}

impl ChatCompletion {
    /// A completion carrying only text. Handy for scripted backends.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// The reply text, or `Err` when the model returned nothing usable.
    pub fn into_text(self) -> Result<String, String> {
        match self.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(format!(
                "empty model reply (finish_reason={})",
                self.finish_reason.as_deref().unwrap_or("none")
            )),
        }
    }
}

/// Token usage statistics.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Errors ─────────────────────────────────────────────────────────

/// A failed chat completion call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// The endpoint answered with a non-success status.
    #[error("endpoint HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never got a complete answer (connect, timeout, reset).
    #[error("request failed: {0}")]
    Transport(String),
    /// A 2xx body that is not a usable completion.
    #[error("bad response: {0}")]
    Response(String),
}

impl EndpointError {
    /// Rate limits, server errors, and transport failures are worth another
    /// try. Client errors (400, 401, 403, 404, 422, ...) and unusable bodies
    /// are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            EndpointError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            EndpointError::Transport(_) => true,
            EndpointError::Response(_) => false,
        }
    }
}

// ── Backend seam ───────────────────────────────────────────────────

/// Boxed future returned by [`ChatBackend::chat`].
pub type ChatFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatCompletion, EndpointError>> + Send + 'a>>;

/// Anything that can answer a chat completion request.
///
/// [`EndpointClient`] talks HTTP; tests script replies. Uses a boxed future
/// so the trait stays dyn-compatible and solvers can hold an
/// `Arc<dyn ChatBackend>`.
pub trait ChatBackend: Send + Sync {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions endpoint
/// (OpenAI, Groq, a local Ollama, vLLM, ...).
#[derive(Clone)]
pub struct EndpointClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl EndpointClient {
    /// Create a client for `base_url`. `api_key` is sent as a bearer token
    /// when present.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("connections-agents/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from a resolved preset, reading the API key from the
    /// preset's environment variable.
    pub fn from_preset(preset: &api::endpoint::EndpointPreset) -> Result<Self, String> {
        let api_key = preset.resolve_api_key()?;
        Self::new(preset.base_url(), api_key)
    }

    /// Full URL of the chat completions route.
    pub fn chat_url(&self) -> String {
        format!("{}/{CHAT_COMPLETIONS_PATH}", self.base_url)
    }

    /// Send a chat completion request.
    pub async fn send(&self, body: &ChatRequest) -> Result<ChatCompletion, EndpointError> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={:?}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let mut request = self.client.post(self.chat_url()).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let resp = request
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EndpointError::Transport(format!("reading body: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }
}

impl ChatBackend for EndpointClient {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.send(body))
    }
}

/// Parse a chat completions response body.
fn parse_completion(text: &str) -> Result<ChatCompletion, EndpointError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| EndpointError::Response(format!("unparseable body: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(EndpointError::Response(format!("endpoint error: {}", err.message())));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let Some(choice) = parsed.choices.and_then(|c| c.into_iter().next()) else {
        return Err(EndpointError::Response(format!("no choices in {text}")));
    };

    Ok(ChatCompletion {
        content: choice.message.content,
        usage: parsed.usage,
        finish_reason: choice.finish_reason,
        model: parsed.model,
    })
}
