use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::ProviderKind;

const DEFAULT_MODEL_PROVIDER: &str = "ollama";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MODEL_MAX_TOKENS: u64 = 4096;
const DEFAULT_HISTORY_FILE_NAME: &str = ".ask_history.json";
const DEFAULT_HISTORY_PRUNING: bool = true;
const DEFAULT_HISTORY_RETENTION_SECS: u64 = 60 * 60;
const DEFAULT_HISTORY_PREVIEW_CHARS: u64 = 60;
const DEFAULT_HISTORY_VIEW_COUNT: u64 = 10;
const DEFAULT_DEBUG_INTERPRETER: &str = "python3";
const DEFAULT_QUERY_APPEND: &str = "";

#[derive(Debug, Clone)]
pub struct Config {
    pub model_provider: String,
    pub model: String,
    pub escalation_model: String,
    pub model_base_url: String,
    pub api_key: Option<String>,
    pub model_timeout_secs: u64,
    pub model_max_tokens: u64,
    pub history_file: PathBuf,
    pub history_pruning: bool,
    pub history_retention_secs: u64,
    pub history_preview_chars: usize,
    pub history_view_count: usize,
    pub debug_interpreter: String,
    pub query_append: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let model_provider = get_var("MODEL_PROVIDER")
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.to_string());
        let provider = ProviderKind::parse(&model_provider);

        let model = non_empty(get_var("MODEL"))
            .or_else(|| provider.map(|kind| kind.default_model().to_string()))
            .unwrap_or_default();
        let escalation_model = non_empty(get_var("ESCALATION_MODEL"))
            .or_else(|| provider.map(|kind| kind.escalation_model().to_string()))
            .unwrap_or_else(|| model.clone());
        let model_base_url = non_empty(get_var("MODEL_BASE_URL"))
            .or_else(|| provider.map(|kind| kind.default_base_url().to_string()))
            .unwrap_or_default();
        let api_key = non_empty(get_var("MODEL_API_KEY")).or_else(|| {
            provider
                .and_then(ProviderKind::api_key_var)
                .and_then(|var| non_empty(get_var(var)))
        });

        Self {
            model_provider,
            model,
            escalation_model,
            model_base_url,
            api_key,
            model_timeout_secs: parse_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
                DEFAULT_MODEL_TIMEOUT_SECS,
            ),
            model_max_tokens: parse_positive_u64(
                get_var("MODEL_MAX_TOKENS").as_deref(),
                DEFAULT_MODEL_MAX_TOKENS,
            ),
            history_file: parse_history_file(get_var("HISTORY_FILE").as_deref()),
            history_pruning: parse_bool(
                get_var("HISTORY_PRUNING").as_deref(),
                DEFAULT_HISTORY_PRUNING,
            ),
            history_retention_secs: parse_positive_u64(
                get_var("HISTORY_RETENTION_SECS").as_deref(),
                DEFAULT_HISTORY_RETENTION_SECS,
            ),
            history_preview_chars: parse_positive_u64(
                get_var("HISTORY_PREVIEW_CHARS").as_deref(),
                DEFAULT_HISTORY_PREVIEW_CHARS,
            ) as usize,
            history_view_count: parse_positive_u64(
                get_var("HISTORY_VIEW_COUNT").as_deref(),
                DEFAULT_HISTORY_VIEW_COUNT,
            ) as usize,
            debug_interpreter: non_empty(get_var("DEBUG_INTERPRETER"))
                .unwrap_or_else(|| DEFAULT_DEBUG_INTERPRETER.to_string()),
            query_append: non_empty(get_var("QUERY_APPEND"))
                .unwrap_or_else(|| DEFAULT_QUERY_APPEND.to_string()),
        }
    }

    /// Retention window applied at load time, or `None` when pruning is off.
    pub fn retention(&self) -> Option<Duration> {
        self.history_pruning
            .then(|| Duration::from_secs(self.history_retention_secs))
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn parse_history_file(raw: Option<&str>) -> PathBuf {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_history_file)
}

// The history lives next to the installed binary so every shell shares it.
fn default_history_file() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_HISTORY_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE_NAME))
}
