//! Events emitted while solving a game.
//!
//! Solvers and the [`Runner`](crate::runner::Runner) report progress through
//! [`SolverEvent`] variants. Callers implement [`EventHandler`] to observe
//! them for logging, progress output, or metrics.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or quiet runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, warn};

use super::parse::Verdict;
use super::{Proposal, Role};
use crate::UsageInfo;
use crate::game::GuessOutcome;

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SolverEvent<'a> {
    /// A consensus attempt is starting.
    AttemptStarted { attempt: u32, max_attempts: u32 },
    /// One model call completed.
    ModelCall {
        role: Role,
        model: &'a str,
        usage: Option<&'a UsageInfo>,
    },
    /// The proposer suggested a group.
    Proposed {
        attempt: u32,
        proposal: &'a Proposal,
    },
    /// The validator picked its group for the proposer's category.
    Validated { attempt: u32, group: &'a [String] },
    /// The checker compared the two groups.
    Verdict { attempt: u32, verdict: Verdict },
    /// A reply could not be parsed. The attempt is spent.
    MalformedReply {
        attempt: u32,
        role: Role,
        reason: &'a str,
    },
    /// The agents agreed on a group the board had already rejected.
    RepeatedRejection {
        attempt: u32,
        proposal: &'a Proposal,
    },
    /// A proposal survived consensus.
    ConsensusReached {
        attempts: u32,
        proposal: &'a Proposal,
    },
    /// Every attempt was spent without agreement.
    ConsensusExhausted { attempts: u32 },
    /// A proposal is about to be submitted to the board.
    GuessSubmitted { game: &'a str, proposal: &'a Proposal },
    /// The board judged a submitted proposal.
    GuessJudged {
        game: &'a str,
        proposal: &'a Proposal,
        outcome: &'a GuessOutcome,
        strikes: u32,
    },
    /// A game ended.
    GameFinished {
        game: &'a str,
        solved: usize,
        total: usize,
        strikes: u32,
    },
}

impl SolverEvent<'_> {
    /// Total tokens of a `ModelCall` event.
    pub fn total_tokens(&self) -> Option<u64> {
        if let SolverEvent::ModelCall {
            usage: Some(usage), ..
        } = self
        {
            Some(
                u64::from(usage.prompt_tokens.unwrap_or(0))
                    + u64::from(usage.completion_tokens.unwrap_or(0)),
            )
        } else {
            None
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────

/// Handler for solver events. The default implementation ignores everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &SolverEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let SolverEvent::ConsensusReached { proposal, .. } = event {
///         println!("agreed on {proposal}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&SolverEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&SolverEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&SolverEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SolverEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &SolverEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs every event through `tracing`. Per-attempt chatter is at debug;
/// guesses and game results are at info.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &SolverEvent<'_>) {
        match event {
            SolverEvent::AttemptStarted {
                attempt,
                max_attempts,
            } => {
                debug!("[attempt {attempt}/{max_attempts}]");
            }
            SolverEvent::ModelCall { role, model, usage } => match usage {
                Some(u) => debug!(
                    "{role} ({model}): prompt={}, completion={}",
                    u.prompt_tokens.unwrap_or(0),
                    u.completion_tokens.unwrap_or(0)
                ),
                None => debug!("{role} ({model}): no usage reported"),
            },
            SolverEvent::Proposed { attempt, proposal } => {
                debug!("[attempt {attempt}] proposer: {proposal}");
            }
            SolverEvent::Validated { attempt, group } => {
                debug!("[attempt {attempt}] validator: [{}]", group.join(", "));
            }
            SolverEvent::Verdict { attempt, verdict } => {
                debug!("[attempt {attempt}] {verdict}");
            }
            SolverEvent::MalformedReply {
                attempt,
                role,
                reason,
            } => {
                warn!("[attempt {attempt}] malformed {role} reply: {reason}");
            }
            SolverEvent::RepeatedRejection { attempt, proposal } => {
                warn!("[attempt {attempt}] agreed on a group the board already rejected: {proposal}");
            }
            SolverEvent::ConsensusReached { attempts, proposal } => {
                info!("Consensus after {attempts} attempt(s): {proposal}");
            }
            SolverEvent::ConsensusExhausted { attempts } => {
                warn!("No consensus after {attempts} attempt(s)");
            }
            SolverEvent::GuessSubmitted { game, proposal } => {
                debug!("[{game}] submitting {proposal}");
            }
            SolverEvent::GuessJudged {
                game,
                proposal,
                outcome,
                strikes,
            } => match outcome {
                GuessOutcome::Correct { category, .. } => {
                    info!("[{game}] correct: {} ({})", category.group, proposal.group.join(", "));
                }
                GuessOutcome::Incorrect { one_away } => {
                    info!(
                        "[{game}] incorrect{}: {proposal} (strikes: {strikes})",
                        if *one_away { ", one away" } else { "" }
                    );
                }
            },
            SolverEvent::GameFinished {
                game,
                solved,
                total,
                strikes,
            } => {
                info!("[{game}] finished: {solved}/{total} solved, {strikes} strike(s)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn composite_dispatches_to_all_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();

        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| a.lock().unwrap().push("a")))
            .with_if(false, NoopHandler)
            .with_opt(None::<NoopHandler>)
            .with(FnEventHandler::new(move |_| b.lock().unwrap().push("b")));

        handler.on_event(&SolverEvent::ConsensusExhausted { attempts: 3 });
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn total_tokens_only_for_model_calls() {
        let usage = UsageInfo {
            prompt_tokens: Some(7),
            completion_tokens: Some(3),
            total_tokens: None,
        };
        let call = SolverEvent::ModelCall {
            role: Role::Proposer,
            model: "m",
            usage: Some(&usage),
        };
        assert_eq!(call.total_tokens(), Some(10));
        assert_eq!(
            SolverEvent::ConsensusExhausted { attempts: 1 }.total_tokens(),
            None
        );
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let proposal = Proposal::new(vec!["HAIL".into(), "RAIN".into()], "WET");
        let usage = UsageInfo::default();
        let right = GuessOutcome::Correct {
            index: 0,
            category: crate::game::Category::new(0, "WET", &["HAIL", "RAIN"]),
        };
        let wrong = GuessOutcome::Incorrect { one_away: true };
        let events = [
            SolverEvent::AttemptStarted {
                attempt: 1,
                max_attempts: 3,
            },
            SolverEvent::ModelCall {
                role: Role::Validator,
                model: "m",
                usage: Some(&usage),
            },
            SolverEvent::ModelCall {
                role: Role::Proposer,
                model: "m",
                usage: None,
            },
            SolverEvent::Proposed {
                attempt: 1,
                proposal: &proposal,
            },
            SolverEvent::Validated {
                attempt: 1,
                group: &proposal.group,
            },
            SolverEvent::Verdict {
                attempt: 1,
                verdict: Verdict::NotReached,
            },
            SolverEvent::MalformedReply {
                attempt: 2,
                role: Role::ConsensusChecker,
                reason: "empty",
            },
            SolverEvent::RepeatedRejection {
                attempt: 2,
                proposal: &proposal,
            },
            SolverEvent::ConsensusReached {
                attempts: 3,
                proposal: &proposal,
            },
            SolverEvent::ConsensusExhausted { attempts: 3 },
            SolverEvent::GuessSubmitted {
                game: "g",
                proposal: &proposal,
            },
            SolverEvent::GuessJudged {
                game: "g",
                proposal: &proposal,
                outcome: &right,
                strikes: 0,
            },
            SolverEvent::GuessJudged {
                game: "g",
                proposal: &proposal,
                outcome: &wrong,
                strikes: 1,
            },
            SolverEvent::GameFinished {
                game: "g",
                solved: 1,
                total: 4,
                strikes: 1,
            },
        ];

        let count = Arc::new(Mutex::new(0usize));
        let seen = count.clone();
        let handler = CompositeEventHandler::new()
            .with(LoggingHandler)
            .with(FnEventHandler::new(move |_| *seen.lock().unwrap() += 1));
        for event in &events {
            handler.on_event(event);
        }
        assert_eq!(*count.lock().unwrap(), events.len());
    }
}
