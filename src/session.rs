use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::history::{EscalationOutcome, HistoryStore};
use crate::model::MessageRole;
use crate::model_gateway::{ModelGateway, ModelGatewayRequest};
use crate::prompt::ESCALATION_NOTICE;

/// Picks the model for this invocation: an explicit flag wins, then the
/// escalation model for escalated conversations, then the configured model.
pub fn resolve_model(explicit: Option<&str>, cfg: &Config, escalated: bool) -> String {
    match explicit.map(str::trim).filter(|model| !model.is_empty()) {
        Some(model) => model.to_string(),
        None if escalated => cfg.escalation_model.clone(),
        None => cfg.model.clone(),
    }
}

/// One conversational exchange over a loaded history.
pub struct Session<'a, G> {
    gateway: &'a G,
    history: &'a mut HistoryStore,
}

impl<'a, G> Session<'a, G>
where
    G: ModelGateway,
{
    pub fn new(gateway: &'a G, history: &'a mut HistoryStore) -> Self {
        Self { gateway, history }
    }

    pub fn is_escalated(&self) -> bool {
        self.history.is_escalated()
    }

    /// Seeds the system prompt if needed and records the escalation.
    pub fn escalate(&mut self, system_prompt: impl FnOnce() -> String) -> Result<EscalationOutcome> {
        let seeded = self.history.ensure_system_message(system_prompt);
        let outcome = self.history.escalate(ESCALATION_NOTICE);
        if seeded || outcome == EscalationOutcome::Escalated {
            self.history
                .persist()
                .context("Failed to save chat history")?;
        }
        Ok(outcome)
    }

    /// Sends `query` with the whole conversation and records the answer.
    ///
    /// Nothing is written back if the model call fails, so the stored
    /// conversation is left exactly as it was loaded.
    pub async fn ask(
        &mut self,
        model: &str,
        query: String,
        system_prompt: impl FnOnce() -> String,
    ) -> Result<String> {
        self.history.ensure_system_message(system_prompt);
        self.history.append(MessageRole::User, query)?;
        debug!(
            model = %model,
            message_count = self.history.len(),
            "sending conversation to model"
        );

        let response = self
            .gateway
            .chat(ModelGatewayRequest {
                model: model.to_string(),
                messages: self.history.messages().to_vec(),
            })
            .await?;

        self.history
            .append(MessageRole::Assistant, response.content.clone())?;
        self.history
            .persist()
            .context("Failed to save chat history")?;
        info!(
            model = %model,
            response_len = response.content.len(),
            "answer recorded"
        );
        Ok(response.content)
    }
}
