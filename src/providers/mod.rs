pub mod anthropic;
pub(crate) mod http_errors;
pub mod ollama;
pub mod openai_compat;

use anyhow::{Result, anyhow};

use crate::config::Config;

const SUPPORTED_PROVIDERS: &str = "ollama, openai, groq, perplexity, anthropic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Groq,
    Perplexity,
    Anthropic,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            "perplexity" => Some(Self::Perplexity),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Perplexity => "perplexity",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Perplexity => "https://api.perplexity.ai",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5:3b",
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.1-8b-instant",
            Self::Perplexity => "sonar",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Stronger sibling used once a conversation is escalated.
    pub fn escalation_model(self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5:14b",
            Self::OpenAi => "gpt-4o",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::Perplexity => "sonar-pro",
            Self::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    pub fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Perplexity => Some("PERPLEXITY_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }
}

/// Checks that the configured provider exists and has its credentials,
/// before anything touches the history or probes the host.
pub fn preflight(cfg: &Config) -> Result<ProviderKind> {
    let kind = ProviderKind::parse(&cfg.model_provider).ok_or_else(|| {
        anyhow!(
            "Unsupported MODEL_PROVIDER='{}'. Supported providers: {}.",
            cfg.model_provider,
            SUPPORTED_PROVIDERS
        )
    })?;

    if let Some(var) = kind.api_key_var()
        && cfg.api_key.is_none()
    {
        return Err(anyhow!(
            "{} is not set. Export it (or MODEL_API_KEY) to use MODEL_PROVIDER={}.",
            var,
            kind.as_str()
        ));
    }

    Ok(kind)
}

pub(crate) fn api_key<'a>(cfg: &'a Config, kind: ProviderKind) -> Result<&'a str> {
    cfg.api_key.as_deref().ok_or_else(|| {
        anyhow!(
            "{} is not set.",
            kind.api_key_var().unwrap_or("MODEL_API_KEY")
        )
    })
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
