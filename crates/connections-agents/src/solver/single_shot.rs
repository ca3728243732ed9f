//! One model call per guess, as a baseline for the consensus solver.

use std::fmt;
use std::sync::Arc;

use super::events::EventHandler;
use super::ledger::FeedbackLedger;
use super::parse::{canonicalize, find_board_words, parse_category, parse_group};
use super::{ModelCaller, Proposal, Role, Solver, SolverError, SolverFuture};
use crate::ChatBackend;
use crate::api::retry::RetryConfig;
use crate::api::usage::TokenLedger;
use crate::game::{GuessOutcome, normalize_word};
use crate::prompt::PromptSet;

/// Sampling temperature used unless overridden.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleShotMode {
    /// Ask for a group directly.
    Naive,
    /// Ask the model to reason before committing.
    ChainOfThought,
}

impl SingleShotMode {
    fn template(self) -> &'static str {
        match self {
            SingleShotMode::Naive => "naive",
            SingleShotMode::ChainOfThought => "cot",
        }
    }
}

impl fmt::Display for SingleShotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template())
    }
}

pub struct SingleShotSolver {
    caller: ModelCaller,
    model: String,
    mode: SingleShotMode,
    prompts: PromptSet,
    /// Wrong guesses and solved words, shown to the model on later guesses.
    ledger: FeedbackLedger,
}

impl SingleShotSolver {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>, mode: SingleShotMode) -> Self {
        Self {
            caller: ModelCaller::new(backend).with_temperature(Some(DEFAULT_TEMPERATURE)),
            model: model.into(),
            mode,
            prompts: PromptSet::builtin(),
            ledger: FeedbackLedger::new(),
        }
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

    pub fn mode(&self) -> SingleShotMode {
        self.mode
    }

    async fn ask_once(
        &mut self,
        remaining: &[String],
        group_size: usize,
        events: &dyn EventHandler,
    ) -> Result<Proposal, SolverError> {
        let feedback = self.ledger.render();
        let words = remaining.join(", ");
        let size = group_size.to_string();
        let prompt = self.prompts.render(
            self.mode.template(),
            &[
                ("feedback", feedback.as_str()),
                ("words", words.as_str()),
                ("group_size", size.as_str()),
            ],
        );
        let system = self.prompts.get("single_shot_system").to_string();
        let model = self.model.clone();

        let reply = self
            .caller
            .ask(Role::Proposer, &model, &system, &prompt, events)
            .await?;

        let group = extract_group(&reply, remaining, group_size).ok_or_else(|| {
            SolverError::MalformedReply {
                role: Role::Proposer,
                reason: format!("fewer than {group_size} board words in reply"),
            }
        })?;
        Ok(Proposal::new(group, parse_category(&reply).unwrap_or_default()))
    }
}

/// A `Group:` line made only of board words wins; otherwise the first
/// `group_size` board words mentioned anywhere in the reply.
fn extract_group(reply: &str, remaining: &[String], group_size: usize) -> Option<Vec<String>> {
    if let Ok(group) = parse_group(reply, group_size) {
        let group = canonicalize(&group, remaining);
        let on_board = group
            .iter()
            .all(|w| remaining.iter().any(|r| normalize_word(r) == normalize_word(w)));
        if on_board {
            return Some(group);
        }
    }
    let found = find_board_words(reply, remaining, group_size);
    (found.len() == group_size).then_some(found)
}

impl Solver for SingleShotSolver {
    fn name(&self) -> &str {
        self.mode.template()
    }

    fn guess<'a>(
        &'a mut self,
        remaining: &'a [String],
        group_size: usize,
        events: &'a dyn EventHandler,
    ) -> SolverFuture<'a, Result<Proposal, SolverError>> {
        Box::pin(self.ask_once(remaining, group_size, events))
    }

    fn observe(&mut self, proposal: &Proposal, outcome: &GuessOutcome) {
        match outcome {
            GuessOutcome::Correct { category, .. } => self.ledger.record_solved(&category.members),
            GuessOutcome::Incorrect { .. } => {
                let category = if proposal.category.is_empty() {
                    "(unnamed)"
                } else {
                    proposal.category.as_str()
                };
                self.ledger.record_board_rejection(category, &proposal.group);
            }
        }
    }

    fn reset(&mut self) {
        self.ledger.clear();
        self.caller.reset_usage();
    }

    fn usage(&self) -> &TokenLedger {
        self.caller.usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::events::NoopHandler;
    use crate::solver::testing::ScriptedBackend;

    fn remaining() -> Vec<String> {
        ["HAIL", "RAIN", "SLEET", "SNOW", "HEAT", "JAZZ", "NETS", "BUCKS"]
            .iter()
            .map(|w| w.to_string())
            .collect()
    }

    #[tokio::test]
    async fn naive_reads_the_group_line() {
        let backend = Arc::new(ScriptedBackend::new([
            "Group: heat, jazz, nets, bucks\nCategory: NBA teams",
        ]));
        let mut solver = SingleShotSolver::new(backend.clone(), "m", SingleShotMode::Naive);

        let proposal = solver.guess(&remaining(), 4, &NoopHandler).await.unwrap();
        assert_eq!(proposal.group, vec!["HEAT", "JAZZ", "NETS", "BUCKS"]);
        assert_eq!(proposal.category, "NBA teams");
        assert_eq!(solver.name(), "naive");

        let requests = backend.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.temperature, Some(DEFAULT_TEMPERATURE));
        assert!(req.messages[1].content.contains("HAIL, RAIN"));
    }

    #[tokio::test]
    async fn cot_falls_back_to_board_words_in_order() {
        let backend = Arc::new(ScriptedBackend::new([
            "Thinking: snow and hail fall from the sky, as do rain and sleet. \
             The teams can wait.",
        ]));
        let mut solver = SingleShotSolver::new(backend.clone(), "m", SingleShotMode::ChainOfThought);

        let proposal = solver.guess(&remaining(), 4, &NoopHandler).await.unwrap();
        assert_eq!(proposal.group, vec!["SNOW", "HAIL", "RAIN", "SLEET"]);
        assert_eq!(proposal.category, "");
        assert!(backend.prompt(0).contains("step by step"));
    }

    #[tokio::test]
    async fn group_line_with_hallucinated_words_uses_fallback() {
        let backend = Arc::new(ScriptedBackend::new([
            "Group: hail, rain, fog, mist\nCategory: weather",
        ]));
        let mut solver = SingleShotSolver::new(backend, "m", SingleShotMode::Naive);
        let err = solver.guess(&remaining(), 4, &NoopHandler).await.unwrap_err();
        assert!(matches!(err, SolverError::MalformedReply { .. }));
    }

    #[tokio::test]
    async fn wrong_guesses_are_shown_next_time() {
        let backend = Arc::new(ScriptedBackend::new([
            "Group: hail, rain, sleet, heat\nCategory: weather",
            "Group: hail, rain, sleet, snow\nCategory: weather",
        ]));
        let mut solver = SingleShotSolver::new(backend.clone(), "m", SingleShotMode::Naive)
            .with_temperature(None);

        let first = solver.guess(&remaining(), 4, &NoopHandler).await.unwrap();
        solver.observe(&first, &GuessOutcome::Incorrect { one_away: true });
        solver.guess(&remaining(), 4, &NoopHandler).await.unwrap();

        assert!(backend.prompt(1).contains("* weather: (HAIL, RAIN, SLEET, HEAT)"));
        assert_eq!(backend.requests.lock().unwrap()[1].temperature, None);
        assert_eq!(solver.usage().calls(), 2);

        solver.reset();
        assert_eq!(solver.usage().calls(), 0);
    }
}
