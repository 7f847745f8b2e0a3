use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{Message, MessageRole};
use crate::providers::http_errors::{model_api_request_error, model_api_status_error};
use crate::providers::{ProviderKind, api_key, endpoint};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

// The Messages API takes system instructions out of band, so every
// system-role entry is folded into the top-level `system` field.
fn build_request<'a>(
    model: &'a str,
    max_tokens: u64,
    messages: &'a [Message],
) -> MessagesRequest<'a> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|msg| msg.role == MessageRole::System)
        .map(|msg| msg.content.as_str())
        .collect();

    MessagesRequest {
        model,
        max_tokens,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: messages
            .iter()
            .filter(|msg| msg.role != MessageRole::System)
            .map(|msg| ChatMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect(),
    }
}

fn collect_text(parsed: MessagesResponse) -> Result<String> {
    let text: Vec<String> = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(anyhow!("Model response contained no text content"));
    }
    Ok(text.join(""))
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    model: &str,
    messages: &[Message],
) -> Result<String> {
    let kind = ProviderKind::Anthropic;
    let api_url = endpoint(&cfg.model_base_url, "messages");
    let key = api_key(cfg, kind)?;
    let body = build_request(model, cfg.model_max_tokens, messages);
    debug!(
        api_url = %api_url,
        model = %model,
        message_count = body.messages.len(),
        "sending anthropic messages request"
    );

    let response = client
        .post(&api_url)
        .header("x-api-key", key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, error = %err, "anthropic request failed");
            model_api_request_error(err, &api_url, cfg.model_timeout_secs)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            status = %status,
            response_body_len = response_body.len(),
            "anthropic returned non-success status"
        );
        return Err(model_api_status_error(
            status,
            &response_body,
            &api_url,
            kind.api_key_var(),
        ));
    }

    let parsed: MessagesResponse = response
        .json()
        .await
        .context("Failed to parse anthropic messages response")?;
    collect_text(parsed)
}
