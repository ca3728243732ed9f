//! Run IDs and token accounting.
//!
//! Every game gets a `run_id` for log correlation. Token usage is tracked
//! per model because a consensus solver may route its roles to different
//! models with very different prices.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::UsageInfo;

/// Generate a unique ID for one game.
pub fn generate_run_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same nanosecond.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts:x}-{count:04x}")
}

/// Prompt and completion tokens for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u32,
}

impl ModelUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Cumulative token usage keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    models: BTreeMap<String, ModelUsage>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call. Missing usage still counts the call.
    pub fn record(&mut self, model: &str, usage: Option<&UsageInfo>) {
        let entry = self.models.entry(model.to_string()).or_default();
        entry.calls += 1;
        if let Some(usage) = usage {
            entry.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
            entry.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
        }
    }

    /// Fold another ledger into this one.
    pub fn merge(&mut self, other: &TokenLedger) {
        for (model, usage) in &other.models {
            let entry = self.models.entry(model.clone()).or_default();
            entry.prompt_tokens += usage.prompt_tokens;
            entry.completion_tokens += usage.completion_tokens;
            entry.calls += usage.calls;
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelUsage> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelUsage)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.models.values().map(|u| u.prompt_tokens).sum()
    }

    pub fn completion_tokens(&self) -> u64 {
        self.models.values().map(|u| u.completion_tokens).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens() + self.completion_tokens()
    }

    pub fn calls(&self) -> u32 {
        self.models.values().map(|u| u.calls).sum()
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total over {} call(s)",
            self.prompt_tokens(),
            self.completion_tokens(),
            self.total_tokens(),
            self.calls(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> UsageInfo {
        UsageInfo {
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
            total_tokens: Some(prompt + completion),
        }
    }

    #[test]
    fn run_id_unique() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("run-"));
    }

    #[test]
    fn ledger_accumulates_per_model() {
        let mut ledger = TokenLedger::new();
        ledger.record("gpt-4o", Some(&usage(100, 20)));
        ledger.record("gpt-4o", Some(&usage(50, 10)));
        ledger.record("gpt-4o-mini", None);

        let big = ledger.get("gpt-4o").unwrap();
        assert_eq!(big.prompt_tokens, 150);
        assert_eq!(big.completion_tokens, 30);
        assert_eq!(big.calls, 2);
        assert_eq!(ledger.get("gpt-4o-mini").unwrap().total(), 0);
        assert_eq!(ledger.calls(), 3);
        assert_eq!(ledger.total_tokens(), 180);
    }

    #[test]
    fn merge_combines_ledgers() {
        let mut a = TokenLedger::new();
        a.record("m", Some(&usage(10, 1)));
        let mut b = TokenLedger::new();
        b.record("m", Some(&usage(5, 2)));
        b.record("n", Some(&usage(1, 1)));

        a.merge(&b);
        assert_eq!(a.get("m").unwrap().prompt_tokens, 15);
        assert_eq!(a.get("n").unwrap().calls, 1);
        assert!(a.summary().contains("20 total"));
    }
}
