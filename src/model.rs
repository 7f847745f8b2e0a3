use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::providers::{self, ProviderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversational turn. The timestamp only drives retention pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    pub fn at(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    model: &str,
    messages: &[Message],
) -> Result<String> {
    let provider = providers::preflight(cfg).inspect_err(|err| {
        warn!(provider = %cfg.model_provider, error = %err, "model provider is not usable");
    })?;

    debug!(
        provider = provider.as_str(),
        model = %model,
        message_count = messages.len(),
        "dispatching model chat request"
    );

    match provider {
        ProviderKind::Ollama => providers::ollama::chat(client, cfg, model, messages).await,
        ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::Perplexity => {
            providers::openai_compat::chat(client, cfg, provider, model, messages).await
        }
        ProviderKind::Anthropic => {
            providers::anthropic::chat(client, cfg, model, messages).await
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Message, MessageRole};

    #[test]
    fn message_serializes_role_lowercase_with_rfc3339_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = Message::at(MessageRole::Assistant, "hi there", ts);

        let json = serde_json::to_value(&msg).expect("message should serialize");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi there");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn message_deserializes_persisted_entry() {
        let msg: Message = serde_json::from_str(
            r#"{"role":"user","content":"hello","timestamp":"2024-05-01T12:00:00Z"}"#,
        )
        .expect("entry should parse");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn constructors_tag_roles() {
        assert_eq!(Message::system("s").role.as_str(), "system");
        assert_eq!(Message::user("u").role.as_str(), "user");
        assert_eq!(Message::assistant("a").role.as_str(), "assistant");
    }
}
