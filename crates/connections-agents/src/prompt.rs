//! Prompt templates.
//!
//! Every prompt the solvers send is a named template with `{{placeholder}}`
//! variables. [`PromptSet::builtin`] carries the defaults; a directory of
//! `<name>.txt` files can replace any of them without recompiling.
//!
//! | Template | Variables |
//! |----------|-----------|
//! | `proposer_system`, `validator_system`, `consensus_system`, `single_shot_system` | none |
//! | `proposer` | `feedback`, `words`, `group_size` |
//! | `validator` | `feedback`, `words`, `category`, `group_size` |
//! | `consensus` | `proposer_group`, `validator_group` |
//! | `naive`, `cot` | `feedback`, `words`, `group_size` |

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap_or_else(|e| unreachable!("{e}"))
});

/// Substitute `{{name}}` placeholders. Placeholders without a value are
/// removed.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        })
        .trim()
        .to_string()
}

const PROPOSER_SYSTEM: &str = "\
You are an expert at word-association puzzles. You know literature, pop culture, \
idioms, and wordplay. Given a list of words, you find a group of related words and \
name the connection as precisely as possible. Good categories cover their words and \
nothing else on the board, for example:

SNEAKER BRANDS: adidas, nike, puma, reebok
CLEANING VERBS: dust, mop, sweep, vacuum
___ MAN SUPERHEROES: bat, iron, spider, super
SYNONYMS FOR SAD: blue, down, glum, low
BABY ANIMALS: calf, cub, joey, kid";

const PROPOSER: &str = "\
{{feedback}}

Words: {{words}}

Objective:
Find a group of {{group_size}} related words from the list above and give a specific \
category that describes exactly what connects them.

Guidelines:
- The category must be narrower than broad labels like 'Names', 'Verbs', or '5-Letter Words'.
- Every word in the group must clearly fit the category. Watch for common phrases, \
wordplay, and words with several meanings.
- Avoid categories that would also fit other words on the board.

Respond in exactly this format and nothing else:
Group: {{group_size}} comma-separated words from the list
Category: category name";

const VALIDATOR_SYSTEM: &str = "\
You are an expert at word-association puzzles. You know literature, pop culture, \
idioms, and wordplay. Given a list of words and a category, you pick the words that \
belong to that category.";

const VALIDATOR: &str = "\
{{feedback}}

Words: {{words}}
Category: {{category}}

Objective:
Pick the {{group_size}} words from the list above that belong to the category.

Guidelines:
- The category is given. Only choose the words that best match it.
- Each word must fit without ambiguity. Watch for wordplay and words with several meanings.
- Choose exactly {{group_size}} words.

Respond in exactly this format and nothing else:
Group: {{group_size}} comma-separated words from the list";

const CONSENSUS_SYSTEM: &str = "\
You compare two groups of words and decide whether they contain exactly the same \
words, ignoring order and capitalization. Answer 'Consensus reached' if they do and \
'Consensus not reached' otherwise.";

const CONSENSUS: &str = "\
Proposer group: {{proposer_group}}
Validator group: {{validator_group}}

Do both groups contain exactly the same words, in any order?
Reply with exactly one of these two phrases and nothing else:
Consensus reached
Consensus not reached";

const SINGLE_SHOT_SYSTEM: &str = "\
You are playing a word-grouping puzzle. The board hides several categories of words. \
You submit one group at a time.";

const NAIVE: &str = "\
{{feedback}}

Words: {{words}}

Pick {{group_size}} words from the list that share a hidden category.

Respond in exactly this format and nothing else:
Group: {{group_size}} comma-separated words from the list
Category: category name";

const COT: &str = "\
{{feedback}}

Words: {{words}}

Pick {{group_size}} words from the list that share a hidden category. First think \
step by step: note words with several meanings, words that complete a common phrase, \
and categories that could absorb more than {{group_size}} words. Then commit.

End your answer with exactly these two lines:
Group: {{group_size}} comma-separated words from the list
Category: category name";

/// Names of every template, in documentation order.
pub const TEMPLATE_NAMES: [&str; 9] = [
    "proposer_system",
    "proposer",
    "validator_system",
    "validator",
    "consensus_system",
    "consensus",
    "single_shot_system",
    "naive",
    "cot",
];

/// A complete set of prompt templates.
#[derive(Debug, Clone)]
pub struct PromptSet {
    templates: BTreeMap<&'static str, String>,
}

impl PromptSet {
    pub fn builtin() -> Self {
        let defaults = [
            PROPOSER_SYSTEM,
            PROPOSER,
            VALIDATOR_SYSTEM,
            VALIDATOR,
            CONSENSUS_SYSTEM,
            CONSENSUS,
            SINGLE_SHOT_SYSTEM,
            NAIVE,
            COT,
        ];
        Self {
            templates: TEMPLATE_NAMES
                .into_iter()
                .zip(defaults)
                .map(|(name, text)| (name, text.to_string()))
                .collect(),
        }
    }

    /// Replace templates with `<name>.txt` files found in `dir`. Files that
    /// do not name a known template are skipped with a warning.
    pub fn with_overrides_from(mut self, dir: &Path) -> Result<Self, String> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| format!("failed to read prompt dir '{}': {e}", dir.display()))?;

        for entry in entries {
            let entry = entry.map_err(|e| format!("failed to read prompt dir entry: {e}"))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(name) = TEMPLATE_NAMES.iter().find(|n| **n == stem) else {
                warn!("Ignoring unknown prompt template '{}'", path.display());
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
            debug!("Prompt template '{name}' overridden from {}", path.display());
            self.templates.insert(name, text);
        }
        Ok(self)
    }

    /// Raw template text.
    pub fn get(&self, name: &str) -> &str {
        self.templates.get(name).map_or("", |t| t.as_str())
    }

    /// Render a template with variables.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> String {
        render_template(self.get(name), vars)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}
