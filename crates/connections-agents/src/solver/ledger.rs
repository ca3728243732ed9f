//! Feedback carried between attempts and guesses.
//!
//! The ledger remembers category and group pairings that failed (either
//! because the agents disagreed or because the board said no) and the words
//! of categories already solved. [`FeedbackLedger::render`] turns that into
//! the note prepended to every proposer and validator prompt.

use std::collections::HashSet;

use crate::game::normalize_word;

/// Rejected pairings grouped by category, plus solved words.
#[derive(Debug, Clone, Default)]
pub struct FeedbackLedger {
    /// Categories in first-rejection order, each with its rejected groups.
    rejected: Vec<(String, Vec<Vec<String>>)>,
    /// Normalized groups the board itself judged wrong.
    board_rejected: HashSet<Vec<String>>,
    solved_words: Vec<String>,
}

fn group_key(group: &[String]) -> Vec<String> {
    let mut key: Vec<String> = group.iter().map(|w| normalize_word(w)).collect();
    key.sort();
    key
}

impl FeedbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a category and group pairing that did not hold up. A group
    /// already listed under the same category is not listed twice.
    pub fn record_rejection(&mut self, category: &str, group: &[String]) {
        let category = category.trim();
        let key = group_key(group);
        let index = match self
            .rejected
            .iter()
            .position(|(c, _)| c.eq_ignore_ascii_case(category))
        {
            Some(i) => i,
            None => {
                self.rejected.push((category.to_string(), Vec::new()));
                self.rejected.len() - 1
            }
        };
        let groups = &mut self.rejected[index].1;
        if !groups.iter().any(|g| group_key(g) == key) {
            groups.push(group.to_vec());
        }
    }

    /// Record a pairing the board judged incorrect.
    pub fn record_board_rejection(&mut self, category: &str, group: &[String]) {
        self.board_rejected.insert(group_key(group));
        self.record_rejection(category, group);
    }

    /// Whether the board already rejected exactly this group.
    pub fn board_rejected(&self, group: &[String]) -> bool {
        self.board_rejected.contains(&group_key(group))
    }

    /// Record the words of a solved category.
    pub fn record_solved(&mut self, words: &[String]) {
        for word in words {
            if !self.solved_words.iter().any(|w| w.eq_ignore_ascii_case(word)) {
                self.solved_words.push(word.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty() && self.solved_words.is_empty()
    }

    /// Number of rejected pairings across all categories.
    pub fn rejection_count(&self) -> usize {
        self.rejected.iter().map(|(_, groups)| groups.len()).sum()
    }

    pub fn solved_words(&self) -> &[String] {
        &self.solved_words
    }

    /// The feedback note, or an empty string when there is nothing to say.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("Note:\n");
        if !self.rejected.is_empty() {
            out.push_str(
                "- Be aware that the following category and word group pairs either do not \
                 match or the category isn't specific enough. **Do not repeat categories**!:\n",
            );
            for (category, groups) in &self.rejected {
                let groups: Vec<String> = groups
                    .iter()
                    .map(|g| format!("({})", g.join(", ")))
                    .collect();
                out.push_str(&format!("  * {category}: {}\n", groups.join("; ")));
            }
        }
        if !self.solved_words.is_empty() {
            out.push_str(&format!(
                "- Ensure that your guessed category does not encompass any of these words: {}\n",
                self.solved_words.join(", ")
            ));
        }
        out
    }

    pub fn clear(&mut self) {
        self.rejected.clear();
        self.board_rejected.clear();
        self.solved_words.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn empty_ledger_renders_nothing() {
        assert_eq!(FeedbackLedger::new().render(), "");
    }

    #[test]
    fn rejections_group_under_their_category() {
        let mut ledger = FeedbackLedger::new();
        ledger.record_rejection("WEATHER", &words(&["HAIL", "RAIN", "SLEET", "HEAT"]));
        ledger.record_rejection("TEAMS", &words(&["HEAT", "JAZZ", "NETS", "TAB"]));
        ledger.record_rejection("weather", &words(&["HAIL", "RAIN", "SNOW", "HEAT"]));
        // Same group again, different order: not repeated.
        ledger.record_rejection("WEATHER", &words(&["heat", "sleet", "rain", "hail"]));

        assert_eq!(ledger.rejection_count(), 3);
        let rendered = ledger.render();
        assert_eq!(
            rendered,
            "Note:\n\
             - Be aware that the following category and word group pairs either do not match \
             or the category isn't specific enough. **Do not repeat categories**!:\n  \
             * WEATHER: (HAIL, RAIN, SLEET, HEAT); (HAIL, RAIN, SNOW, HEAT)\n  \
             * TEAMS: (HEAT, JAZZ, NETS, TAB)\n"
        );
    }

    #[test]
    fn solved_words_line() {
        let mut ledger = FeedbackLedger::new();
        ledger.record_solved(&words(&["HAIL", "RAIN"]));
        ledger.record_solved(&words(&["hail", "SNOW"]));
        assert_eq!(
            ledger.render(),
            "Note:\n- Ensure that your guessed category does not encompass any of these words: HAIL, RAIN, SNOW\n"
        );
    }

    #[test]
    fn board_rejections_are_tracked_separately() {
        let mut ledger = FeedbackLedger::new();
        let group = words(&["A", "B", "C", "D"]);
        ledger.record_rejection("X", &group);
        assert!(!ledger.board_rejected(&group));

        ledger.record_board_rejection("Y", &words(&["d", "c", "b", "a"]));
        assert!(ledger.board_rejected(&group));
        assert_eq!(ledger.rejection_count(), 2);

        ledger.clear();
        assert!(ledger.is_empty());
        assert!(!ledger.board_rejected(&group));
    }
}
