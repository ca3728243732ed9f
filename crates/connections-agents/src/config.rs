//! Solver configuration with sensible defaults.
//!
//! [`SolverConfig`] captures every knob of a run and builds the matching
//! solver via [`build_solver`](SolverConfig::build_solver).

use std::sync::Arc;

use crate::ChatBackend;
use crate::DEFAULT_MAX_TOKENS;
use crate::api::retry::RetryConfig;
use crate::api::router::RoleRouting;
use crate::game::{DEFAULT_GROUP_SIZE, DEFAULT_MAX_STRIKES};
use crate::prompt::PromptSet;
use crate::runner::DEFAULT_MAX_INVALID_REPLIES;
use crate::solver::consensus::{ConsensusCheck, ConsensusConfig, ConsensusSolver, DEFAULT_MAX_ATTEMPTS};
use crate::solver::single_shot::{SingleShotMode, SingleShotSolver};
use crate::solver::{Role, Solver};

/// Which solver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SolverKind {
    /// Proposer, validator, and consensus checker negotiate each guess.
    Consensus,
    /// One direct model call per guess.
    Naive,
    /// One chain-of-thought model call per guess.
    Cot,
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Default: [`SolverKind::Consensus`].
    pub kind: SolverKind,
    /// Model per role. Single-shot solvers use the proposer's model.
    pub routing: RoleRouting,
    /// Default: `15`.
    pub max_attempts: u32,
    /// Default: [`ConsensusCheck::Model`].
    pub check: ConsensusCheck,
    /// Default: `4`.
    pub group_size: usize,
    /// Default: `4`.
    pub max_strikes: u32,
    /// `None` keeps each solver's own default (unset for consensus, 0.7 for
    /// single-shot).
    pub temperature: Option<f32>,
    /// Default: `512`.
    pub max_tokens: u32,
    pub retry: RetryConfig,
    /// Default: `3`.
    pub max_invalid_replies: u32,
    pub prompts: PromptSet,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kind: SolverKind::Consensus,
            routing: RoleRouting::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            check: ConsensusCheck::Model,
            group_size: DEFAULT_GROUP_SIZE,
            max_strikes: DEFAULT_MAX_STRIKES,
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryConfig::default(),
            max_invalid_replies: DEFAULT_MAX_INVALID_REPLIES,
            prompts: PromptSet::builtin(),
        }
    }
}

impl SolverConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            routing: RoleRouting::single(model),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: SolverKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_role_model(mut self, role: Role, model: Option<String>) -> Self {
        self.routing = self.routing.with_override(role, model);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_local_consensus(mut self, local: bool) -> Self {
        self.check = if local {
            ConsensusCheck::Local
        } else {
            ConsensusCheck::Model
        };
        self
    }

    pub fn with_max_strikes(mut self, max_strikes: u32) -> Self {
        self.max_strikes = max_strikes;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(retries);
        self
    }

    pub fn with_max_invalid_replies(mut self, max: u32) -> Self {
        self.max_invalid_replies = max;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Model description for logs and result records.
    pub fn model_label(&self) -> String {
        match self.kind {
            SolverKind::Consensus => self.routing.label(),
            SolverKind::Naive | SolverKind::Cot => {
                self.routing.model_for(Role::Proposer).to_string()
            }
        }
    }

    pub fn build_consensus_solver(&self, backend: Arc<dyn ChatBackend>) -> ConsensusSolver {
        ConsensusSolver::new(backend, self.routing.clone())
            .with_config(ConsensusConfig {
                max_attempts: self.max_attempts,
                check: self.check,
            })
            .with_prompts(self.prompts.clone())
            .with_retry(self.retry.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    pub fn build_single_shot(
        &self,
        backend: Arc<dyn ChatBackend>,
        mode: SingleShotMode,
    ) -> SingleShotSolver {
        let solver = SingleShotSolver::new(backend, self.routing.model_for(Role::Proposer), mode)
            .with_prompts(self.prompts.clone())
            .with_retry(self.retry.clone())
            .with_max_tokens(self.max_tokens);
        match self.temperature {
            Some(t) => solver.with_temperature(Some(t)),
            None => solver,
        }
    }

    /// Build the solver selected by [`kind`](Self::kind).
    pub fn build_solver(&self, backend: Arc<dyn ChatBackend>) -> Box<dyn Solver> {
        match self.kind {
            SolverKind::Consensus => Box::new(self.build_consensus_solver(backend)),
            SolverKind::Naive => Box::new(self.build_single_shot(backend, SingleShotMode::Naive)),
            SolverKind::Cot => {
                Box::new(self.build_single_shot(backend, SingleShotMode::ChainOfThought))
            }
        }
    }
}
