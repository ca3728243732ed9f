//! Solvers: anything that turns the remaining words into a proposed group.
//!
//! | Solver | Model calls per guess |
//! |--------|-----------------------|
//! | [`ConsensusSolver`](consensus::ConsensusSolver) | proposer + validator + checker per attempt, up to `max_attempts` |
//! | [`SingleShotSolver`](single_shot::SingleShotSolver) | one (naive or chain-of-thought prompt) |
//!
//! The [`Solver`] trait returns a boxed future so runners can drive a
//! `Box<dyn Solver>` chosen at runtime.

pub mod consensus;
pub mod events;
pub mod ledger;
pub mod parse;
pub mod single_shot;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::retry::{RetryConfig, retry_api_call};
use crate::api::usage::TokenLedger;
use crate::game::GuessOutcome;
use crate::{ChatBackend, ChatRequest, DEFAULT_MAX_TOKENS};
use events::{EventHandler, SolverEvent};

/// The model-backed roles of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Proposes a group and its category.
    Proposer,
    /// Picks a group for the proposer's category without seeing its group.
    Validator,
    /// Decides whether the two groups agree.
    ConsensusChecker,
}

impl Role {
    /// Name of this role's system prompt template.
    pub fn system_template(self) -> &'static str {
        match self {
            Role::Proposer => "proposer_system",
            Role::Validator => "validator_system",
            Role::ConsensusChecker => "consensus_system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Proposer => write!(f, "proposer"),
            Role::Validator => write!(f, "validator"),
            Role::ConsensusChecker => write!(f, "consensus checker"),
        }
    }
}

/// A group of words and the category believed to connect them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub group: Vec<String>,
    /// Empty when the solver never named one.
    pub category: String,
}

impl Proposal {
    pub fn new(group: Vec<String>, category: impl Into<String>) -> Self {
        Self {
            group,
            category: category.into(),
        }
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.group.join(", "))?;
        if !self.category.is_empty() {
            write!(f, " as '{}'", self.category)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    /// No agreed proposal within the attempt budget.
    #[error("consensus not reached after {attempts} attempt(s)")]
    ConsensusExhausted { attempts: u32 },
    /// A reply could not be turned into a group (or was empty).
    #[error("malformed {role} reply: {reason}")]
    MalformedReply { role: Role, reason: String },
    /// The endpoint failed after retries.
    #[error("{role} call failed: {message}")]
    Endpoint { role: Role, message: String },
}

/// Boxed future returned by [`Solver::guess`].
pub type SolverFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces one group per call from the words still on the board.
pub trait Solver: Send {
    /// Short name for logs and result records.
    fn name(&self) -> &str;

    /// Propose the next group of `group_size` words from `remaining`.
    fn guess<'a>(
        &'a mut self,
        remaining: &'a [String],
        group_size: usize,
        events: &'a dyn EventHandler,
    ) -> SolverFuture<'a, Result<Proposal, SolverError>>;

    /// Learn from the board's judgement of a submitted proposal.
    fn observe(&mut self, proposal: &Proposal, outcome: &GuessOutcome);

    /// Forget everything learned about the current game.
    fn reset(&mut self);

    /// Tokens spent since the last reset.
    fn usage(&self) -> &TokenLedger;

    /// Negotiation attempts spent by the last `guess`, for solvers that
    /// negotiate.
    fn attempts_used(&self) -> Option<u32> {
        None
    }
}

/// Shared plumbing for model-backed roles: request building, retries, and
/// token accounting.
pub(crate) struct ModelCaller {
    backend: Arc<dyn ChatBackend>,
    retry: RetryConfig,
    temperature: Option<f32>,
    max_tokens: u32,
    usage: TokenLedger,
}

impl ModelCaller {
    pub(crate) fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            usage: TokenLedger::new(),
        }
    }

    pub(crate) fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub(crate) fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn usage(&self) -> &TokenLedger {
        &self.usage
    }

    pub(crate) fn reset_usage(&mut self) {
        self.usage.clear();
    }

    /// Send one system + user exchange and return the reply text.
    ///
    /// Transport failures (after retries) are [`SolverError::Endpoint`]; an
    /// empty reply is [`SolverError::MalformedReply`].
    pub(crate) async fn ask(
        &mut self,
        role: Role,
        model: &str,
        system: &str,
        user: &str,
        events: &dyn EventHandler,
    ) -> Result<String, SolverError> {
        let request = ChatRequest::exchange(model, system, user)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let backend = &self.backend;

        let completion = retry_api_call(&self.retry, || backend.chat(&request))
            .await
            .map_err(|e| SolverError::Endpoint {
                role,
                message: e.to_string(),
            })?;

        self.usage.record(model, completion.usage.as_ref());
        events.on_event(&SolverEvent::ModelCall {
            role,
            model,
            usage: completion.usage.as_ref(),
        });

        completion
            .into_text()
            .map_err(|reason| SolverError::MalformedReply { role, reason })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend shared by the solver tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::{ChatBackend, ChatCompletion, ChatFuture, ChatRequest, EndpointError, UsageInfo};

    /// Replies with queued strings in order and records every request.
    #[derive(Default)]
    pub struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, EndpointError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub fn new<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a non-success HTTP answer.
        pub fn push_error(&self, status: u16, body: &str) {
            self.replies.lock().unwrap().push_back(Err(EndpointError::Status {
                status,
                body: body.to_string(),
            }));
        }

        /// User message of the `i`th request.
        pub fn prompt(&self, i: usize) -> String {
            self.requests.lock().unwrap()[i].messages[1].content.clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ChatBackend for ScriptedBackend {
        fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
            self.requests.lock().unwrap().push(body.clone());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EndpointError::Response("script exhausted".into())));
            Box::pin(async move {
                next.map(|text| ChatCompletion {
                    usage: Some(UsageInfo {
                        prompt_tokens: Some(10),
                        completion_tokens: Some(2),
                        total_tokens: Some(12),
                    }),
                    ..ChatCompletion::text(text)
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;
    use crate::solver::events::NoopHandler;

    #[test]
    fn proposal_display() {
        let p = Proposal::new(vec!["A".into(), "B".into()], "LETTERS");
        assert_eq!(p.to_string(), "[A, B] as 'LETTERS'");
        assert_eq!(Proposal::new(vec!["A".into()], "").to_string(), "[A]");
    }

    #[tokio::test]
    async fn caller_records_usage_and_returns_text() {
        let backend = Arc::new(ScriptedBackend::new(["Group: a, b, c, d"]));
        let mut caller = ModelCaller::new(backend.clone()).with_temperature(Some(0.5));

        let text = caller
            .ask(Role::Proposer, "m", "sys", "user", &NoopHandler)
            .await
            .unwrap();
        assert_eq!(text, "Group: a, b, c, d");
        assert_eq!(caller.usage().get("m").unwrap().prompt_tokens, 10);

        let requests = backend.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.temperature, Some(0.5));
        assert_eq!(req.messages[0].content, "sys");
    }

    #[tokio::test]
    async fn caller_maps_failures() {
        let backend = Arc::new(ScriptedBackend::new(["   "]));
        backend.push_error(401, "invalid_api_key");
        let mut caller = ModelCaller::new(backend);

        let empty = caller
            .ask(Role::Validator, "m", "s", "u", &NoopHandler)
            .await
            .unwrap_err();
        assert!(matches!(
            empty,
            SolverError::MalformedReply {
                role: Role::Validator,
                ..
            }
        ));

        let failed = caller
            .ask(Role::Validator, "m", "s", "u", &NoopHandler)
            .await
            .unwrap_err();
        assert!(
            matches!(failed, SolverError::Endpoint { ref message, .. } if message.contains("HTTP 401"))
        );
        assert_eq!(caller.usage().calls(), 1);
    }
}
