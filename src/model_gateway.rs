use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::model::{self, Message};

/// One outbound generation: the resolved model plus the full conversation.
pub struct ModelGatewayRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGatewayResponse {
    pub content: String,
}

pub type ModelGatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelGatewayResponse>> + 'a>>;

pub trait ModelGateway {
    fn chat<'a>(&'a self, request: ModelGatewayRequest) -> ModelGatewayFuture<'a>;
}

pub struct HostModelGateway<'a> {
    client: &'a Client,
    cfg: &'a Config,
}

impl<'a> HostModelGateway<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self { client, cfg }
    }
}

impl ModelGateway for HostModelGateway<'_> {
    fn chat<'b>(&'b self, request: ModelGatewayRequest) -> ModelGatewayFuture<'b> {
        Box::pin(async move {
            let content =
                model::chat(self.client, self.cfg, &request.model, &request.messages).await?;
            Ok(ModelGatewayResponse { content })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{HostModelGateway, ModelGateway, ModelGatewayRequest};
    use crate::model::Message;
    use crate::providers::test_support::config_for;

    #[tokio::test]
    async fn host_gateway_surfaces_provider_errors_before_any_request() {
        let client = reqwest::Client::new();
        let cfg = config_for("groq", None);
        let gateway = HostModelGateway::new(&client, &cfg);

        let err = gateway
            .chat(ModelGatewayRequest {
                model: "llama-3.1-8b-instant".to_string(),
                messages: vec![Message::user("ping")],
            })
            .await
            .expect_err("gateway chat should fail without a key");

        let msg = format!("{err:#}");
        assert!(msg.contains("GROQ_API_KEY is not set"), "unexpected error message: {msg}");
    }

    #[tokio::test]
    async fn host_gateway_rejects_unknown_provider() {
        let client = reqwest::Client::new();
        let cfg = config_for("bard", None);
        let gateway = HostModelGateway::new(&client, &cfg);

        let err = gateway
            .chat(ModelGatewayRequest {
                model: "any".to_string(),
                messages: vec![Message::user("ping")],
            })
            .await
            .expect_err("gateway chat should fail");

        assert!(format!("{err:#}").contains("Unsupported MODEL_PROVIDER='bard'"));
    }
}
