//! Per-role model routing.
//!
//! The consensus checker only compares two word lists, so it can run on a
//! much cheaper model than the proposer. Roles without an override use the
//! default model.

use crate::solver::Role;

/// Model selection for the solver roles.
#[derive(Debug, Clone)]
pub struct RoleRouting {
    pub default_model: String,
    pub proposer: Option<String>,
    pub validator: Option<String>,
    pub consensus: Option<String>,
}

impl RoleRouting {
    /// Use one model for every role.
    pub fn single(model: impl Into<String>) -> Self {
        Self {
            default_model: model.into(),
            proposer: None,
            validator: None,
            consensus: None,
        }
    }

    pub fn with_override(mut self, role: Role, model: Option<String>) -> Self {
        match role {
            Role::Proposer => self.proposer = model,
            Role::Validator => self.validator = model,
            Role::ConsensusChecker => self.consensus = model,
        }
        self
    }

    /// The model to use for a role.
    pub fn model_for(&self, role: Role) -> &str {
        let specific = match role {
            Role::Proposer => self.proposer.as_deref(),
            Role::Validator => self.validator.as_deref(),
            Role::ConsensusChecker => self.consensus.as_deref(),
        };
        specific.unwrap_or(&self.default_model)
    }

    /// Short label for logs and result records, e.g. `gpt-4o` or
    /// `gpt-4o (consensus: gpt-4o-mini)`.
    pub fn label(&self) -> String {
        let overrides: Vec<String> = [
            ("proposer", &self.proposer),
            ("validator", &self.validator),
            ("consensus", &self.consensus),
        ]
        .into_iter()
        .filter_map(|(name, model)| model.as_ref().map(|m| format!("{name}: {m}")))
        .collect();

        if overrides.is_empty() {
            self.default_model.clone()
        } else {
            format!("{} ({})", self.default_model, overrides.join(", "))
        }
    }
}

impl Default for RoleRouting {
    fn default() -> Self {
        RoleRouting::single(crate::DEFAULT_MODEL)
    }
}
