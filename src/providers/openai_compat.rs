use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::Message;
use crate::providers::http_errors::{model_api_request_error, model_api_status_error};
use crate::providers::{ProviderKind, api_key, endpoint};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn completions_url(base_url: &str) -> String {
    endpoint(base_url, "chat/completions")
}

fn build_request<'a>(model: &'a str, messages: &'a [Message]) -> CompletionRequest<'a> {
    CompletionRequest {
        model,
        messages: messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect(),
    }
}

fn first_choice_content(parsed: CompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Model response contained no message content"))
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    kind: ProviderKind,
    model: &str,
    messages: &[Message],
) -> Result<String> {
    let api_url = completions_url(&cfg.model_base_url);
    let key = api_key(cfg, kind)?;
    let body = build_request(model, messages);
    debug!(
        provider = kind.as_str(),
        api_url = %api_url,
        model = %model,
        message_count = messages.len(),
        "sending chat completion request"
    );

    let response = client
        .post(&api_url)
        .bearer_auth(key)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            warn!(
                provider = kind.as_str(),
                api_url = %api_url,
                error = %err,
                "chat completion request failed"
            );
            model_api_request_error(err, &api_url, cfg.model_timeout_secs)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            provider = kind.as_str(),
            status = %status,
            response_body_len = response_body.len(),
            "chat completion returned non-success status"
        );
        return Err(model_api_status_error(
            status,
            &response_body,
            &api_url,
            kind.api_key_var(),
        ));
    }

    let parsed: CompletionResponse = response
        .json()
        .await
        .context("Failed to parse chat completion response")?;
    let content = first_choice_content(parsed)?;
    debug!(
        provider = kind.as_str(),
        response_len = content.len(),
        "received chat completion response"
    );
    Ok(content)
}
