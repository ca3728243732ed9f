//! Turning free-form model replies into groups, categories, and verdicts.
//!
//! Replies are expected to contain `Group:` and `Category:` lines, but models
//! decorate them with markdown, code fences, bullets, and quotes. Labels are
//! matched case-insensitively and the last occurrence wins, so a
//! chain-of-thought reply that drafts a group before committing is read
//! correctly.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::game::normalize_word;

static LABELED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s>#*\-]*(group|category)[\s*]*[:：]\s*(.*)$")
        .unwrap_or_else(|e| unreachable!("{e}"))
});

static LEADING_AND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^and\s+").unwrap_or_else(|e| unreachable!("{e}")));

/// The consensus checker's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Reached,
    NotReached,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Reached => write!(f, "consensus reached"),
            Verdict::NotReached => write!(f, "consensus not reached"),
        }
    }
}

/// Value of the last `label:` line, with decoration stripped.
fn labeled_value(reply: &str, label: &str) -> Option<String> {
    let cleaned = reply.replace("**", "").replace('`', "");
    LABELED_LINE
        .captures_iter(&cleaned)
        .filter(|caps| caps[1].eq_ignore_ascii_case(label))
        .last()
        .map(|caps| caps[2].trim().trim_matches('*').trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a comma-separated word list.
pub fn split_words(value: &str) -> Vec<String> {
    let separator = if value.contains(',') { ',' } else { ';' };
    value
        .split(separator)
        .map(|w| {
            let w = LEADING_AND.replace(w.trim(), "");
            w.trim_matches(|c: char| {
                c.is_whitespace() || matches!(c, '"' | '\'' | '[' | ']' | '(' | ')' | '.' | '*')
            })
            .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// The words of the last `Group:` line, checked for size and repeats.
pub fn parse_group(reply: &str, group_size: usize) -> Result<Vec<String>, String> {
    let value = labeled_value(reply, "group").ok_or("no 'Group:' line")?;
    let words = split_words(&value);
    if words.len() != group_size {
        return Err(format!(
            "expected {group_size} words, found {} in '{value}'",
            words.len()
        ));
    }
    let distinct: HashSet<String> = words.iter().map(|w| normalize_word(w)).collect();
    if distinct.len() != words.len() {
        return Err(format!("group repeats a word: '{value}'"));
    }
    Ok(words)
}

/// The last `Category:` line, if any.
pub fn parse_category(reply: &str) -> Option<String> {
    labeled_value(reply, "category")
}

/// A proposer reply: a group and a non-empty category.
pub fn parse_proposer_reply(
    reply: &str,
    group_size: usize,
) -> Result<super::Proposal, String> {
    let group = parse_group(reply, group_size)?;
    let category = parse_category(reply).ok_or("no 'Category:' line")?;
    Ok(super::Proposal::new(group, category))
}

/// A validator reply: a group only.
pub fn parse_validator_reply(reply: &str, group_size: usize) -> Result<Vec<String>, String> {
    parse_group(reply, group_size)
}

/// A consensus checker reply. The negative phrase is checked first because
/// it contains the positive one. `None` means neither phrase was found.
///
/// Only the two exact phrases are understood, so a free-form negation such as
/// "No consensus reached" reads as [`Verdict::Reached`]. The `consensus`
/// template asks for one of the phrases and nothing else.
pub fn parse_consensus_reply(reply: &str) -> Option<Verdict> {
    let text = reply
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.contains("consensus not reached") {
        Some(Verdict::NotReached)
    } else if text.contains("consensus reached") {
        Some(Verdict::Reached)
    } else {
        None
    }
}

/// Whether two groups hold the same words, ignoring order and case.
pub fn same_group<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let a: HashSet<String> = a.iter().map(|w| normalize_word(w.as_ref())).collect();
    let b: HashSet<String> = b.iter().map(|w| normalize_word(w.as_ref())).collect();
    a == b
}

/// Replace each word with its board spelling when one matches.
pub fn canonicalize(words: &[String], board: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| {
            let key = normalize_word(w);
            board
                .iter()
                .find(|b| normalize_word(b) == key)
                .cloned()
                .unwrap_or_else(|| w.trim().to_string())
        })
        .collect()
}

/// Board words in the order they first appear in `reply`, at most `limit`.
///
/// Fallback for single-shot replies that ignore the requested format.
pub fn find_board_words(reply: &str, board: &[String], limit: usize) -> Vec<String> {
    let mut found: Vec<(usize, &String)> = board
        .iter()
        .filter_map(|word| {
            let pattern = format!(
                r"(?i)(?:^|[^\p{{L}}\p{{N}}]){}(?:$|[^\p{{L}}\p{{N}}])",
                regex::escape(word.trim())
            );
            let re = Regex::new(&pattern).ok()?;
            re.find(reply).map(|m| (m.start(), word))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found
        .into_iter()
        .take(limit)
        .map(|(_, word)| word.clone())
        .collect()
}
