//! Named endpoint presets and API key resolution.
//!
//! `openai` and `groq` need a key from the environment; a local `ollama`
//! does not. Anything else is taken as a base URL, with an optional
//! caller-chosen key variable.

/// Where chat requests go and which environment variable holds the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointPreset {
    OpenAi,
    Groq,
    Ollama,
    Custom {
        base_url: String,
        api_key_env: Option<String>,
    },
}

impl EndpointPreset {
    /// Parse a preset name, falling back to a custom base URL.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "oai" => EndpointPreset::OpenAi,
            "groq" => EndpointPreset::Groq,
            "ollama" => EndpointPreset::Ollama,
            _ => EndpointPreset::Custom {
                base_url: name.trim().to_string(),
                api_key_env: None,
            },
        }
    }

    /// Attach a key variable to a custom endpoint. No-op for named presets.
    pub fn with_api_key_env(self, var: Option<String>) -> Self {
        match self {
            EndpointPreset::Custom { base_url, .. } => EndpointPreset::Custom {
                base_url,
                api_key_env: var,
            },
            other => other,
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            EndpointPreset::OpenAi => "https://api.openai.com",
            EndpointPreset::Groq => "https://api.groq.com/openai",
            EndpointPreset::Ollama => "http://localhost:11434",
            EndpointPreset::Custom { base_url, .. } => base_url,
        }
    }

    /// The environment variable holding the API key, if this endpoint needs one.
    pub fn api_key_env(&self) -> Option<&str> {
        match self {
            EndpointPreset::OpenAi => Some("OPENAI_API_KEY"),
            EndpointPreset::Groq => Some("GROQ_API_KEY"),
            EndpointPreset::Ollama => None,
            EndpointPreset::Custom { api_key_env, .. } => api_key_env.as_deref(),
        }
    }

    /// Read the API key from the environment.
    ///
    /// Returns `Ok(None)` for endpoints without a key and `Err` when the
    /// required variable is unset or empty.
    pub fn resolve_api_key(&self) -> Result<Option<String>, String> {
        self.resolve_api_key_with(|var| std::env::var(var).ok())
    }

    /// [`resolve_api_key`](Self::resolve_api_key) with an injectable lookup.
    pub fn resolve_api_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<String>, String> {
        let Some(var) = self.api_key_env() else {
            return Ok(None);
        };
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(format!("API key {var} not found in the environment")),
        }
    }
}

impl std::fmt::Display for EndpointPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointPreset::OpenAi => write!(f, "openai"),
            EndpointPreset::Groq => write!(f, "groq"),
            EndpointPreset::Ollama => write!(f, "ollama"),
            EndpointPreset::Custom { base_url, .. } => write!(f, "{base_url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_presets() {
        assert_eq!(EndpointPreset::parse("groq"), EndpointPreset::Groq);
        assert_eq!(EndpointPreset::parse("OAI"), EndpointPreset::OpenAi);
        assert_eq!(EndpointPreset::parse("ollama"), EndpointPreset::Ollama);
    }

    #[test]
    fn unknown_name_is_a_base_url() {
        let preset = EndpointPreset::parse("http://gpu-box:8000");
        assert_eq!(preset.base_url(), "http://gpu-box:8000");
        assert_eq!(preset.api_key_env(), None);

        let keyed = preset.with_api_key_env(Some("VLLM_KEY".into()));
        assert_eq!(keyed.api_key_env(), Some("VLLM_KEY"));
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = EndpointPreset::Groq
            .resolve_api_key_with(|_| None)
            .unwrap_err();
        assert!(err.contains("GROQ_API_KEY"));

        let blank = EndpointPreset::OpenAi.resolve_api_key_with(|_| Some("  ".into()));
        assert!(blank.is_err());
    }

    #[test]
    fn key_resolution() {
        let key = EndpointPreset::OpenAi
            .resolve_api_key_with(|var| (var == "OPENAI_API_KEY").then(|| "sk-test".to_string()))
            .unwrap();
        assert_eq!(key.as_deref(), Some("sk-test"));

        assert_eq!(
            EndpointPreset::Ollama.resolve_api_key_with(|_| None).unwrap(),
            None
        );
    }
}
