//! Convenience re-exports for common `connections-agents` types.
//!
//! ```ignore
//! use connections_agents::prelude::*;
//! ```
//!
//! Parsing helpers, the feedback ledger, and metrics internals are left out.
//! Import those from their modules directly.

// ── Endpoint ────────────────────────────────────────────────────────
pub use crate::api::{EndpointPreset, RetryConfig, RoleRouting, TokenLedger};
pub use crate::{ChatBackend, ChatRequest, EndpointClient, EndpointError, Message};

// ── Puzzle ──────────────────────────────────────────────────────────
pub use crate::game::{Board, Category, GuessOutcome, load_games, sample_board};

// ── Solvers ─────────────────────────────────────────────────────────
pub use crate::config::{SolverConfig, SolverKind};
pub use crate::solver::consensus::{ConsensusCheck, ConsensusConfig, ConsensusSolver};
pub use crate::solver::events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, SolverEvent,
};
pub use crate::solver::single_shot::{SingleShotMode, SingleShotSolver};
pub use crate::solver::{Proposal, Role, Solver, SolverError};

// ── Running ─────────────────────────────────────────────────────────
pub use crate::metrics::{Metrics, RunSummary};
pub use crate::prompt::PromptSet;
pub use crate::runner::{GameEnd, GameRecord, Runner};
pub use crate::store::ResultStore;
