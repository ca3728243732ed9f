//! The consensus guessing protocol.
//!
//! Each attempt runs three roles in order:
//!
//! 1. **Proposer** sees the feedback note and the remaining words, and
//!    answers with a group and a category.
//! 2. **Validator** sees the same words and only the proposer's category, and
//!    answers with its own group.
//! 3. **Consensus checker** compares the two groups. Under
//!    [`ConsensusCheck::Local`] the comparison is a set check instead of a
//!    model call.
//!
//! Agreement ends the guess. Disagreement records the proposer's pairing in
//! the [`FeedbackLedger`] so the next attempt is told not to repeat it. A
//! malformed reply spends the attempt without aborting the guess.

use std::sync::Arc;

use tracing::{debug, warn};

use super::events::{EventHandler, SolverEvent};
use super::ledger::FeedbackLedger;
use super::parse::{
    Verdict, canonicalize, parse_consensus_reply, parse_proposer_reply, parse_validator_reply,
    same_group,
};
use super::{ModelCaller, Proposal, Role, Solver, SolverError, SolverFuture};
use crate::ChatBackend;
use crate::api::retry::RetryConfig;
use crate::api::router::RoleRouting;
use crate::api::usage::TokenLedger;
use crate::game::GuessOutcome;
use crate::prompt::PromptSet;

/// Default attempt budget per guess.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// How the two groups of an attempt are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsensusCheck {
    /// Ask the consensus checker role.
    #[default]
    Model,
    /// Compare the groups as case-insensitive sets, without a model call.
    Local,
}

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Proposer calls allowed per guess.
    pub max_attempts: u32,
    pub check: ConsensusCheck,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            check: ConsensusCheck::Model,
        }
    }
}

/// What one attempt produced, short of an error.
enum Attempt {
    Agreed(Proposal),
    Rejected,
}

pub struct ConsensusSolver {
    caller: ModelCaller,
    routing: RoleRouting,
    prompts: PromptSet,
    config: ConsensusConfig,
    ledger: FeedbackLedger,
    /// Attempts spent by the most recent `guess`.
    last_attempts: u32,
}

impl ConsensusSolver {
    pub fn new(backend: Arc<dyn ChatBackend>, routing: RoleRouting) -> Self {
        Self {
            caller: ModelCaller::new(backend),
            routing,
            prompts: PromptSet::builtin(),
            config: ConsensusConfig::default(),
            ledger: FeedbackLedger::new(),
            last_attempts: 0,
        }
    }

    pub fn with_config(mut self, config: ConsensusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.caller = self.caller.with_retry(retry);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.caller = self.caller.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.caller = self.caller.with_max_tokens(max_tokens);
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn ledger(&self) -> &FeedbackLedger {
        &self.ledger
    }

    async fn ask(
        &mut self,
        role: Role,
        user: &str,
        events: &dyn EventHandler,
    ) -> Result<String, SolverError> {
        let model = self.routing.model_for(role).to_string();
        let system = self.prompts.get(role.system_template()).to_string();
        self.caller.ask(role, &model, &system, user, events).await
    }

    async fn run_attempt(
        &mut self,
        attempt: u32,
        remaining: &[String],
        group_size: usize,
        events: &dyn EventHandler,
    ) -> Result<Attempt, SolverError> {
        let feedback = self.ledger.render();
        let words = remaining.join(", ");
        let size = group_size.to_string();

        // Proposer
        let prompt = self.prompts.render(
            "proposer",
            &[
                ("feedback", feedback.as_str()),
                ("words", words.as_str()),
                ("group_size", size.as_str()),
            ],
        );
        let reply = self.ask(Role::Proposer, &prompt, events).await?;
        let mut proposal = parse_proposer_reply(&reply, group_size).map_err(|reason| {
            SolverError::MalformedReply {
                role: Role::Proposer,
                reason,
            }
        })?;
        proposal.group = canonicalize(&proposal.group, remaining);
        events.on_event(&SolverEvent::Proposed {
            attempt,
            proposal: &proposal,
        });

        // Validator
        let prompt = self.prompts.render(
            "validator",
            &[
                ("feedback", feedback.as_str()),
                ("words", words.as_str()),
                ("category", proposal.category.as_str()),
                ("group_size", size.as_str()),
            ],
        );
        let validated = self
            .ask(Role::Validator, &prompt, events)
            .await
            .and_then(|reply| {
                parse_validator_reply(&reply, group_size).map_err(|reason| {
                    SolverError::MalformedReply {
                        role: Role::Validator,
                        reason,
                    }
                })
            });
        let validated = match validated {
            Ok(group) => canonicalize(&group, remaining),
            Err(e @ SolverError::MalformedReply { .. }) => {
                self.ledger
                    .record_rejection(&proposal.category, &proposal.group);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        events.on_event(&SolverEvent::Validated {
            attempt,
            group: &validated,
        });

        // Consensus
        let verdict = match self.config.check {
            ConsensusCheck::Local => {
                if same_group(&proposal.group, &validated) {
                    Verdict::Reached
                } else {
                    Verdict::NotReached
                }
            }
            ConsensusCheck::Model => {
                let proposer_group = proposal.group.join(", ");
                let validator_group = validated.join(", ");
                let prompt = self.prompts.render(
                    "consensus",
                    &[
                        ("proposer_group", proposer_group.as_str()),
                        ("validator_group", validator_group.as_str()),
                    ],
                );
                match self.ask(Role::ConsensusChecker, &prompt, events).await {
                    Ok(reply) => parse_consensus_reply(&reply).unwrap_or_else(|| {
                        warn!("Unrecognized consensus reply, treating as not reached: {reply}");
                        Verdict::NotReached
                    }),
                    Err(SolverError::MalformedReply { reason, .. }) => {
                        warn!("Consensus checker gave no verdict ({reason}), treating as not reached");
                        Verdict::NotReached
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        events.on_event(&SolverEvent::Verdict { attempt, verdict });

        match verdict {
            Verdict::NotReached => {
                self.ledger
                    .record_rejection(&proposal.category, &proposal.group);
                Ok(Attempt::Rejected)
            }
            Verdict::Reached if self.ledger.board_rejected(&proposal.group) => {
                events.on_event(&SolverEvent::RepeatedRejection {
                    attempt,
                    proposal: &proposal,
                });
                self.ledger
                    .record_rejection(&proposal.category, &proposal.group);
                Ok(Attempt::Rejected)
            }
            Verdict::Reached => Ok(Attempt::Agreed(proposal)),
        }
    }

    async fn negotiate(
        &mut self,
        remaining: &[String],
        group_size: usize,
        events: &dyn EventHandler,
    ) -> Result<Proposal, SolverError> {
        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            self.last_attempts = attempt;
            events.on_event(&SolverEvent::AttemptStarted {
                attempt,
                max_attempts,
            });

            match self.run_attempt(attempt, remaining, group_size, events).await {
                Ok(Attempt::Agreed(proposal)) => {
                    events.on_event(&SolverEvent::ConsensusReached {
                        attempts: attempt,
                        proposal: &proposal,
                    });
                    return Ok(proposal);
                }
                Ok(Attempt::Rejected) => {}
                Err(SolverError::MalformedReply { role, reason }) => {
                    events.on_event(&SolverEvent::MalformedReply {
                        attempt,
                        role,
                        reason: &reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Feedback after exhaustion:\n{}", self.ledger.render());
        events.on_event(&SolverEvent::ConsensusExhausted {
            attempts: max_attempts,
        });
        Err(SolverError::ConsensusExhausted {
            attempts: max_attempts,
        })
    }
}

impl Solver for ConsensusSolver {
    fn name(&self) -> &str {
        "consensus"
    }

    fn guess<'a>(
        &'a mut self,
        remaining: &'a [String],
        group_size: usize,
        events: &'a dyn EventHandler,
    ) -> SolverFuture<'a, Result<Proposal, SolverError>> {
        self.last_attempts = 0;
        Box::pin(self.negotiate(remaining, group_size, events))
    }

    fn observe(&mut self, proposal: &Proposal, outcome: &GuessOutcome) {
        match outcome {
            GuessOutcome::Correct { category, .. } => {
                self.ledger.record_solved(&category.members);
            }
            GuessOutcome::Incorrect { .. } => {
                self.ledger
                    .record_board_rejection(&proposal.category, &proposal.group);
            }
        }
    }

    fn reset(&mut self) {
        self.ledger.clear();
        self.caller.reset_usage();
        self.last_attempts = 0;
    }

    fn usage(&self) -> &TokenLedger {
        self.caller.usage()
    }

    fn attempts_used(&self) -> Option<u32> {
        Some(self.last_attempts)
    }
}
