//! Per-game scoring and run summaries.
//!
//! Scoring: each newly solved category is worth [`POINTS_PER_SOLVE`]; each
//! failed guess costs [`FAILED_GUESS_PENALTY`] at the end, floored at zero.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::usage::TokenLedger;
use crate::game::normalize_word;

pub const POINTS_PER_SOLVE: u32 = 5;
pub const FAILED_GUESS_PENALTY: u32 = 1;

/// Bag-of-words cosine similarity of two category names, in `[0, 1]`.
///
/// Word counts are non-negative, so the cosine never goes below zero. Two
/// empty names score 0.
pub fn category_similarity(a: &str, b: &str) -> f64 {
    fn bag(text: &str) -> HashMap<String, f64> {
        let mut counts = HashMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
        }
        counts
    }

    let (a, b) = (bag(a), bag(b));
    let dot: f64 = a
        .iter()
        .filter_map(|(token, x)| b.get(token).map(|y| x * y))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    let denom = norm(&a) * norm(&b);
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

/// Everything measured about one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Solved flag per category, in board order.
    pub solves: Vec<bool>,
    /// Category indices in the order they were solved.
    pub solve_order: Vec<usize>,
    pub failed_guesses: u32,
    /// Guessed words that were not among the remaining words.
    pub hallucinated_words: u32,
    /// Replies no group could be read from.
    pub invalid_replies: u32,
    pub points: u32,
    /// Similarity of guessed to true category name, per solved category.
    pub category_similarity: Vec<f64>,
    /// Negotiation attempts per submitted or abandoned guess.
    pub consensus_attempts: Vec<u32>,
    pub tokens: TokenLedger,
}

impl Metrics {
    pub fn new(categories: usize) -> Self {
        Self {
            solves: vec![false; categories],
            ..Default::default()
        }
    }

    /// Count a solve. Returns `false` for an index already solved or out of
    /// range, which scores nothing.
    pub fn add_solve(&mut self, index: usize) -> bool {
        match self.solves.get_mut(index) {
            Some(solved) if !*solved => {
                *solved = true;
                self.solve_order.push(index);
                self.points += POINTS_PER_SOLVE;
                true
            }
            _ => false,
        }
    }

    /// Count a wrong guess, and any of its words not in `remaining`.
    pub fn add_failed_guess(&mut self, words: &[String], remaining: &[String]) {
        self.failed_guesses += 1;
        let hallucinated = words
            .iter()
            .filter(|w| {
                let key = normalize_word(w);
                !remaining.iter().any(|r| normalize_word(r) == key)
            })
            .count();
        self.hallucinated_words += hallucinated as u32;
    }

    /// Count a guess that never reached the board (no consensus).
    pub fn add_abandoned_guess(&mut self) {
        self.failed_guesses += 1;
    }

    pub fn add_invalid_reply(&mut self) {
        self.invalid_replies += 1;
    }

    pub fn record_category(&mut self, guessed: &str, actual: &str) {
        self.category_similarity
            .push(category_similarity(guessed, actual));
    }

    pub fn record_attempts(&mut self, attempts: u32) {
        self.consensus_attempts.push(attempts);
    }

    pub fn solved_count(&self) -> usize {
        self.solves.iter().filter(|s| **s).count()
    }

    /// Percentage of categories solved.
    pub fn solve_rate(&self) -> f64 {
        if self.solves.is_empty() {
            return 0.0;
        }
        self.solved_count() as f64 / self.solves.len() as f64 * 100.0
    }

    pub fn final_points(&self) -> u32 {
        self.points
            .saturating_sub(self.failed_guesses * FAILED_GUESS_PENALTY)
    }

    pub fn mean_category_similarity(&self) -> Option<f64> {
        mean(&self.category_similarity)
    }

    pub fn total_attempts(&self) -> u32 {
        self.consensus_attempts.iter().sum()
    }

    pub fn summary(&self) -> String {
        let similarity = self
            .mean_category_similarity()
            .map_or("n/a".to_string(), |s| format!("{s:.2}"));
        format!(
            "solved {}/{} ({:.0}%), {} failed, {} hallucinated, points {} (final {}), category similarity {}, {}",
            self.solved_count(),
            self.solves.len(),
            self.solve_rate(),
            self.failed_guesses,
            self.hallucinated_words,
            self.points,
            self.final_points(),
            similarity,
            self.tokens.summary(),
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Aggregate over many games.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub games: usize,
    pub perfect_games: usize,
    pub failed_guesses: u32,
    solve_rates: Vec<f64>,
    final_points: Vec<u32>,
    pub tokens: TokenLedger,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metrics: &Metrics) {
        self.games += 1;
        if !metrics.solves.is_empty() && metrics.solves.iter().all(|s| *s) {
            self.perfect_games += 1;
        }
        self.failed_guesses += metrics.failed_guesses;
        self.solve_rates.push(metrics.solve_rate());
        self.final_points.push(metrics.final_points());
        self.tokens.merge(&metrics.tokens);
    }

    pub fn mean_solve_rate(&self) -> f64 {
        mean(&self.solve_rates).unwrap_or(0.0)
    }

    pub fn mean_final_points(&self) -> f64 {
        let points: Vec<f64> = self.final_points.iter().map(|p| f64::from(*p)).collect();
        mean(&points).unwrap_or(0.0)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} game(s): mean solve rate {:.1}%, {} perfect, {} failed guess(es), mean final points {:.2}, {}",
            self.games,
            self.mean_solve_rate(),
            self.perfect_games,
            self.failed_guesses,
            self.mean_final_points(),
            self.tokens.summary(),
        )
    }
}
