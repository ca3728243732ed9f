//! Puzzle state: categories, the board, and guess judging.
//!
//! A [`Board`] holds the hidden categories of one game, which of them are
//! solved, and the strike count. Word comparison is case-insensitive and
//! ignores surrounding whitespace, since model replies rarely preserve the
//! board's capitalization.

pub mod load;

pub use load::{ArchivedGame, DEFAULT_ARCHIVE_URL, LoadError, load_games, sample_board};

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard number of words per category.
pub const DEFAULT_GROUP_SIZE: usize = 4;

/// Mistakes allowed before the game ends.
pub const DEFAULT_MAX_STRIKES: u32 = 4;

/// Canonical form used for every word comparison.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_uppercase()
}

/// One hidden category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Difficulty level, 0 (easiest) to 3.
    pub level: u32,
    /// The category name, e.g. `WET WEATHER`.
    pub group: String,
    pub members: Vec<String>,
}

impl Category {
    pub fn new(level: u32, group: impl Into<String>, members: &[&str]) -> Self {
        Self {
            level,
            group: group.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn member_set(&self) -> HashSet<String> {
        self.members.iter().map(|m| normalize_word(m)).collect()
    }

    /// Whether `words` is exactly this category's member set.
    pub fn matches<S: AsRef<str>>(&self, words: &[S]) -> bool {
        let guess: HashSet<String> = words.iter().map(|w| normalize_word(w.as_ref())).collect();
        guess == self.member_set()
    }

    /// Number of distinct guessed words that belong to this category.
    pub fn overlap<S: AsRef<str>>(&self, words: &[S]) -> usize {
        let members = self.member_set();
        let guess: HashSet<String> = words.iter().map(|w| normalize_word(w.as_ref())).collect();
        guess.intersection(&members).count()
    }
}

/// Reasons a board cannot be built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board has no categories")]
    Empty,
    #[error("category '{group}' has {found} members; expected exactly {expected}")]
    WrongGroupSize {
        group: String,
        expected: usize,
        found: usize,
    },
    #[error("word '{0}' appears more than once on the board")]
    DuplicateWord(String),
}

/// Why no more guesses are accepted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GameOver {
    #[error("game over: reached the maximum of {0} strikes")]
    StrikesExhausted(u32),
    #[error("game over: every category is already solved")]
    AllSolved,
}

/// The board's judgement of one submitted group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// The group matched the category at `index` (position on the board).
    Correct { index: usize, category: Category },
    /// No match. `one_away` is set when all but one word belong to a single
    /// unsolved category.
    Incorrect { one_away: bool },
}

impl GuessOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, GuessOutcome::Correct { .. })
    }
}

/// State of one game.
#[derive(Debug, Clone)]
pub struct Board {
    categories: Vec<Category>,
    solved: Vec<bool>,
    /// Every word in presentation order.
    word_order: Vec<String>,
    group_size: usize,
    max_strikes: u32,
    strikes: u32,
}

impl Board {
    /// Build a board, checking that every category has `group_size` members
    /// and that no word appears twice.
    pub fn new(
        categories: Vec<Category>,
        group_size: usize,
        max_strikes: u32,
    ) -> Result<Self, BoardError> {
        if categories.is_empty() {
            return Err(BoardError::Empty);
        }
        let mut seen = HashSet::new();
        for category in &categories {
            if category.members.len() != group_size {
                return Err(BoardError::WrongGroupSize {
                    group: category.group.clone(),
                    expected: group_size,
                    found: category.members.len(),
                });
            }
            for member in &category.members {
                if !seen.insert(normalize_word(member)) {
                    return Err(BoardError::DuplicateWord(member.clone()));
                }
            }
        }

        let word_order = categories
            .iter()
            .flat_map(|c| c.members.iter().cloned())
            .collect();
        Ok(Self {
            solved: vec![false; categories.len()],
            categories,
            word_order,
            group_size,
            max_strikes,
            strikes: 0,
        })
    }

    /// Present the words in a seeded random order instead of category order.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.word_order.shuffle(&mut rng);
        self
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn max_strikes(&self) -> u32 {
        self.max_strikes
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Every word on the board, in presentation order.
    pub fn all_words(&self) -> &[String] {
        &self.word_order
    }

    /// Words of the categories not yet solved, in presentation order.
    pub fn remaining_words(&self) -> Vec<String> {
        let solved: HashSet<String> = self
            .categories
            .iter()
            .zip(&self.solved)
            .filter(|(_, solved)| **solved)
            .flat_map(|(c, _)| c.members.iter().map(|m| normalize_word(m)))
            .collect();
        self.word_order
            .iter()
            .filter(|w| !solved.contains(&normalize_word(w)))
            .cloned()
            .collect()
    }

    /// Which categories are solved, in board order.
    pub fn solved_categories(&self) -> &[bool] {
        &self.solved
    }

    pub fn solved_count(&self) -> usize {
        self.solved.iter().filter(|s| **s).count()
    }

    pub fn is_solved(&self) -> bool {
        self.solved.iter().all(|s| *s)
    }

    pub fn is_over(&self) -> bool {
        self.is_solved() || self.strikes >= self.max_strikes
    }

    /// Submit a group. A miss costs a strike.
    pub fn guess<S: AsRef<str>>(&mut self, words: &[S]) -> Result<GuessOutcome, GameOver> {
        if self.strikes >= self.max_strikes {
            return Err(GameOver::StrikesExhausted(self.max_strikes));
        }
        if self.is_solved() {
            return Err(GameOver::AllSolved);
        }

        let matched = self
            .categories
            .iter()
            .enumerate()
            .find(|(i, c)| !self.solved[*i] && c.matches(words))
            .map(|(i, c)| (i, c.clone()));

        if let Some((index, category)) = matched {
            self.solved[index] = true;
            return Ok(GuessOutcome::Correct { index, category });
        }

        let one_away = self
            .categories
            .iter()
            .zip(&self.solved)
            .any(|(c, solved)| !*solved && c.overlap(words) + 1 == self.group_size);
        self.strikes += 1;
        Ok(GuessOutcome::Incorrect { one_away })
    }

    /// Restore the board to its initial state.
    pub fn reset(&mut self) {
        self.solved.iter_mut().for_each(|s| *s = false);
        self.strikes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        sample_board()
    }

    #[test]
    fn rejects_wrong_group_size() {
        let err = Board::new(
            vec![Category::new(0, "SHORT", &["A", "B", "C"])],
            4,
            DEFAULT_MAX_STRIKES,
        )
        .unwrap_err();
        assert!(matches!(err, BoardError::WrongGroupSize { found: 3, .. }));
    }

    #[test]
    fn rejects_duplicate_words() {
        let err = Board::new(
            vec![
                Category::new(0, "ONE", &["A", "B"]),
                Category::new(1, "TWO", &["b", "C"]),
            ],
            2,
            DEFAULT_MAX_STRIKES,
        )
        .unwrap_err();
        assert_eq!(err, BoardError::DuplicateWord("b".into()));
    }

    #[test]
    fn correct_guess_is_case_insensitive_and_order_free() {
        let mut board = board();
        let outcome = board.guess(&["snow", " Hail", "SLEET", "rain "]).unwrap();
        match outcome {
            GuessOutcome::Correct { index, category } => {
                assert_eq!(index, 0);
                assert_eq!(category.group, "WET WEATHER");
            }
            other => panic!("expected correct, got {other:?}"),
        }
        assert_eq!(board.solved_categories(), &[true, false, false, false]);
        assert_eq!(board.remaining_words().len(), 12);
        assert!(!board.remaining_words().contains(&"HAIL".to_string()));
    }

    #[test]
    fn incorrect_guess_costs_a_strike_and_reports_one_away() {
        let mut board = board();
        let outcome = board.guess(&["HAIL", "RAIN", "SLEET", "HEAT"]).unwrap();
        assert_eq!(outcome, GuessOutcome::Incorrect { one_away: true });
        assert_eq!(board.strikes(), 1);

        let outcome = board.guess(&["HAIL", "RAIN", "HEAT", "JAZZ"]).unwrap();
        assert_eq!(outcome, GuessOutcome::Incorrect { one_away: false });
        assert_eq!(board.strikes(), 2);
    }

    #[test]
    fn solved_category_cannot_be_matched_twice() {
        let mut board = board();
        board.guess(&["HAIL", "RAIN", "SLEET", "SNOW"]).unwrap();
        let again = board.guess(&["HAIL", "RAIN", "SLEET", "SNOW"]).unwrap();
        assert!(!again.is_correct());
    }

    #[test]
    fn game_over_after_max_strikes() {
        let mut board = Board::new(sample_board().categories().to_vec(), 4, 2).unwrap();
        board.guess(&["HAIL", "HEAT", "TAB", "MOM"]).unwrap();
        board.guess(&["HAIL", "HEAT", "TAB", "MOM"]).unwrap();
        assert!(board.is_over());
        assert_eq!(
            board.guess(&["HAIL", "RAIN", "SLEET", "SNOW"]),
            Err(GameOver::StrikesExhausted(2))
        );
    }

    #[test]
    fn game_over_when_everything_solved() {
        let mut board = board();
        for category in board.categories().to_vec() {
            assert!(board.guess(&category.members).unwrap().is_correct());
        }
        assert!(board.is_solved());
        assert!(board.is_over());
        assert_eq!(
            board.guess(&["HAIL", "RAIN", "SLEET", "SNOW"]),
            Err(GameOver::AllSolved)
        );
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut board = board();
        board.guess(&["HAIL", "RAIN", "SLEET", "SNOW"]).unwrap();
        board.guess(&["HAIL", "HEAT", "TAB", "MOM"]).unwrap();
        board.reset();
        assert_eq!(board.strikes(), 0);
        assert_eq!(board.solved_count(), 0);
        assert_eq!(board.remaining_words().len(), 16);
    }

    #[test]
    fn shuffle_is_deterministic_and_keeps_words() {
        let a = board().shuffled(42);
        let b = board().shuffled(42);
        assert_eq!(a.all_words(), b.all_words());

        let mut sorted: Vec<String> = a.all_words().to_vec();
        sorted.sort();
        let mut original: Vec<String> = board().all_words().to_vec();
        original.sort();
        assert_eq!(sorted, original);
    }
}
