//! Drives one game from the first guess to game over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::usage::generate_run_id;
use crate::config::SolverConfig;
use crate::game::{Board, GameOver, GuessOutcome};
use crate::metrics::Metrics;
use crate::solver::events::{EventHandler, SolverEvent};
use crate::solver::{Solver, SolverError};

/// Consecutive unreadable replies tolerated before a game is abandoned.
pub const DEFAULT_MAX_INVALID_REPLIES: u32 = 3;

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEnd {
    Solved,
    StrikesExhausted,
    ConsensusExhausted { attempts: u32 },
    InvalidReplies { count: u32 },
    EndpointError { message: String },
}

/// One line of the results file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub game: String,
    pub solver: String,
    pub model: String,
    pub end: GameEnd,
    pub strikes: u32,
    pub solve_rate: f64,
    pub final_points: u32,
    pub metrics: Metrics,
}

pub struct Runner {
    model_label: String,
    max_invalid_replies: u32,
}

impl Runner {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            model_label: config.model_label(),
            max_invalid_replies: config.max_invalid_replies,
        }
    }

    /// Play `board` until it is solved, out of strikes, or the solver gives
    /// up. The solver is reset first.
    pub async fn play(
        &self,
        game: &str,
        board: &mut Board,
        solver: &mut dyn Solver,
        events: &dyn EventHandler,
    ) -> GameRecord {
        let run_id = generate_run_id();
        info!("[{game}] {} solver on {} ({run_id})", solver.name(), self.model_label);

        solver.reset();
        let mut metrics = Metrics::new(board.categories().len());
        let mut invalid_streak = 0u32;

        let end = loop {
            if board.is_solved() {
                break GameEnd::Solved;
            }
            if board.is_over() {
                break GameEnd::StrikesExhausted;
            }

            let remaining = board.remaining_words();
            let guess = solver.guess(&remaining, board.group_size(), events).await;
            if let Some(attempts) = solver.attempts_used() {
                metrics.record_attempts(attempts);
            }

            let proposal = match guess {
                Ok(proposal) => {
                    invalid_streak = 0;
                    proposal
                }
                Err(SolverError::ConsensusExhausted { attempts }) => {
                    metrics.add_abandoned_guess();
                    break GameEnd::ConsensusExhausted { attempts };
                }
                Err(SolverError::MalformedReply { role, reason }) => {
                    metrics.add_invalid_reply();
                    invalid_streak += 1;
                    warn!(
                        "[{game}] unreadable {role} reply ({invalid_streak}/{}): {reason}",
                        self.max_invalid_replies
                    );
                    if invalid_streak >= self.max_invalid_replies {
                        break GameEnd::InvalidReplies {
                            count: invalid_streak,
                        };
                    }
                    continue;
                }
                Err(e @ SolverError::Endpoint { .. }) => {
                    error!("[{game}] {e}");
                    break GameEnd::EndpointError {
                        message: e.to_string(),
                    };
                }
            };

            events.on_event(&SolverEvent::GuessSubmitted {
                game,
                proposal: &proposal,
            });
            let outcome = match board.guess(&proposal.group) {
                Ok(outcome) => outcome,
                Err(GameOver::AllSolved) => break GameEnd::Solved,
                Err(GameOver::StrikesExhausted(_)) => break GameEnd::StrikesExhausted,
            };

            match &outcome {
                GuessOutcome::Correct { index, category } => {
                    metrics.add_solve(*index);
                    metrics.record_category(&proposal.category, &category.group);
                }
                GuessOutcome::Incorrect { .. } => {
                    metrics.add_failed_guess(&proposal.group, &remaining);
                }
            }
            events.on_event(&SolverEvent::GuessJudged {
                game,
                proposal: &proposal,
                outcome: &outcome,
                strikes: board.strikes(),
            });
            solver.observe(&proposal, &outcome);
        };

        metrics.tokens = solver.usage().clone();
        events.on_event(&SolverEvent::GameFinished {
            game,
            solved: board.solved_count(),
            total: board.categories().len(),
            strikes: board.strikes(),
        });
        debug!("[{game}] {}", metrics.summary());

        GameRecord {
            timestamp: Utc::now(),
            run_id,
            game: game.to_string(),
            solver: solver.name().to_string(),
            model: self.model_label.clone(),
            end,
            strikes: board.strikes(),
            solve_rate: metrics.solve_rate(),
            final_points: metrics.final_points(),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::usage::TokenLedger;
    use crate::game::sample_board;
    use crate::solver::events::NoopHandler;
    use crate::solver::testing::ScriptedBackend;
    use crate::solver::{Proposal, Role, SolverFuture};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays a fixed list of guess results.
    struct ScriptedSolver {
        script: VecDeque<Result<Proposal, SolverError>>,
        observed: Vec<bool>,
        usage: TokenLedger,
        resets: u32,
    }

    impl ScriptedSolver {
        fn new(script: Vec<Result<Proposal, SolverError>>) -> Self {
            Self {
                script: script.into(),
                observed: Vec::new(),
                usage: TokenLedger::new(),
                resets: 0,
            }
        }
    }

    impl Solver for ScriptedSolver {
        fn name(&self) -> &str {
            "scripted"
        }

        fn guess<'a>(
            &'a mut self,
            _remaining: &'a [String],
            _group_size: usize,
            _events: &'a dyn EventHandler,
        ) -> SolverFuture<'a, Result<Proposal, SolverError>> {
            let next = self
                .script
                .pop_front()
                .unwrap_or(Err(SolverError::ConsensusExhausted { attempts: 0 }));
            Box::pin(async move { next })
        }

        fn observe(&mut self, _proposal: &Proposal, outcome: &GuessOutcome) {
            self.observed.push(outcome.is_correct());
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.usage.record("m", None);
        }

        fn usage(&self) -> &TokenLedger {
            &self.usage
        }
    }

    fn guess(words: [&str; 4], category: &str) -> Result<Proposal, SolverError> {
        Ok(Proposal::new(
            words.iter().map(|w| w.to_string()).collect(),
            category,
        ))
    }

    fn runner() -> Runner {
        Runner::new(&SolverConfig::new("m"))
    }

    #[tokio::test]
    async fn plays_to_a_full_solve() {
        let mut solver = ScriptedSolver::new(vec![
            guess(["HAIL", "RAIN", "SLEET", "SNOW"], "wet weather"),
            guess(["HEAT", "TAB", "MOM", "LEVEL"], "nonsense"),
            guess(["BUCKS", "HEAT", "JAZZ", "NETS"], "NBA teams"),
            guess(["OPTION", "RETURN", "SHIFT", "TAB"], "keys"),
            guess(["KAYAK", "LEVEL", "MOM", "RACECAR"], "palindromes"),
        ]);
        let mut board = sample_board();

        let record = runner()
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;
        assert_eq!(record.end, GameEnd::Solved);
        assert_eq!(record.strikes, 1);
        assert_eq!(record.metrics.solve_order, vec![0, 1, 2, 3]);
        assert_eq!(record.metrics.failed_guesses, 1);
        assert_eq!(record.metrics.hallucinated_words, 0);
        assert_eq!(record.final_points, 19);
        assert_eq!(record.solve_rate, 100.0);
        assert_eq!(solver.observed, vec![true, false, true, true, true]);
        assert_eq!(solver.resets, 1);
        assert_eq!(record.metrics.tokens.calls(), 1);
        assert!((record.metrics.category_similarity[0] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exhausted_consensus_ends_the_game_as_a_failure() {
        let mut solver = ScriptedSolver::new(vec![
            guess(["HAIL", "RAIN", "SLEET", "SNOW"], "weather"),
            Err(SolverError::ConsensusExhausted { attempts: 15 }),
        ]);
        let mut board = sample_board();

        let record = runner()
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;
        assert_eq!(record.end, GameEnd::ConsensusExhausted { attempts: 15 });
        assert_eq!(record.metrics.failed_guesses, 1);
        assert_eq!(record.strikes, 0);
        assert_eq!(record.final_points, 4);
    }

    #[tokio::test]
    async fn strikes_end_the_game_and_count_hallucinations() {
        let wrong = || guess(["HAIL", "FOG", "TAB", "MOM"], "x");
        let mut solver = ScriptedSolver::new(vec![wrong(), wrong(), wrong(), wrong(), wrong()]);
        let mut board = sample_board();

        let record = runner()
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;
        assert_eq!(record.end, GameEnd::StrikesExhausted);
        assert_eq!(record.strikes, 4);
        assert_eq!(record.metrics.failed_guesses, 4);
        assert_eq!(record.metrics.hallucinated_words, 4);
        assert_eq!(solver.script.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_replies_are_tolerated_then_abandoned() {
        let bad = || {
            Err(SolverError::MalformedReply {
                role: Role::Proposer,
                reason: "no group".into(),
            })
        };
        let mut solver = ScriptedSolver::new(vec![
            bad(),
            guess(["HAIL", "RAIN", "SLEET", "SNOW"], "weather"),
            bad(),
            bad(),
            bad(),
        ]);
        let mut board = sample_board();

        let record = runner()
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;
        assert_eq!(record.end, GameEnd::InvalidReplies { count: 3 });
        assert_eq!(record.metrics.invalid_replies, 4);
        assert_eq!(board.solved_count(), 1);
    }

    #[tokio::test]
    async fn endpoint_errors_end_the_game() {
        let mut solver = ScriptedSolver::new(vec![Err(SolverError::Endpoint {
            role: Role::Validator,
            message: "endpoint HTTP 401".into(),
        })]);
        let mut board = sample_board();

        let record = runner()
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;
        assert!(
            matches!(record.end, GameEnd::EndpointError { ref message } if message.contains("401"))
        );
        assert_eq!(record.metrics.failed_guesses, 0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["end"]["kind"], "endpoint_error");
        assert_eq!(json["solver"], "scripted");
    }

    #[tokio::test]
    async fn board_feedback_reaches_the_next_consensus_round() {
        let backend = Arc::new(ScriptedBackend::new([
            "Group: hail, rain, sleet, heat\nCategory: TEMPS",
            "Group: HEAT, HAIL, RAIN, SLEET",
            "Consensus reached",
            "Group: hail, rain, sleet, snow\nCategory: WET WEATHER",
            "Group: snow, sleet, rain, hail",
            "Consensus reached",
        ]));
        let config = SolverConfig::new("m");
        let mut solver = config.build_consensus_solver(backend.clone());
        let mut board = sample_board();

        let record = Runner::new(&config)
            .play("sample", &mut board, &mut solver, &NoopHandler)
            .await;

        // The board's verdict on TEMPS is in the next proposer prompt.
        let second = backend.prompt(3);
        assert!(second.starts_with("Note:"), "{second}");
        assert!(second.contains("* TEMPS: (HAIL, RAIN, SLEET, HEAT)"));
        // After the solve, its words are called out as taken.
        let third = backend.prompt(6);
        assert!(third.contains("does not encompass any of these words: HAIL, RAIN, SLEET, SNOW"));

        assert_eq!(record.strikes, 1);
        assert_eq!(record.metrics.solve_order, vec![0]);
        assert_eq!(record.metrics.failed_guesses, 1);
        assert_eq!(record.metrics.consensus_attempts, vec![1, 1, 1]);
        assert_eq!(record.metrics.tokens.calls(), 6);
        // The script runs dry on the third guess.
        assert!(matches!(record.end, GameEnd::EndpointError { .. }));
    }
}
