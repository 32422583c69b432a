use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::Prompt,
    providers::{anthropic, gemini, openai},
};
use std::sync::Arc;
use tracing::debug;

const PREAMBLE: &str = "You are a WhatsApp customer-service assistant for a small business. \
Follow the business instructions in the prompt exactly and reply with the message text only.";

/// Single-turn text completion.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct RigResponder<C: CompletionClient> {
    client: C,
    model: String,
    max_tokens: u64,
}

impl<C: CompletionClient> RigResponder<C> {
    pub fn new(config: &Config, client: C) -> Arc<Self> {
        Arc::new(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl<C> Responder for RigResponder<C>
where
    C: CompletionClient + Send + Sync,
    C::CompletionModel: 'static,
{
    async fn complete(&self, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .max_tokens(self.max_tokens)
            .build();

        let response = agent.prompt(prompt).await?;
        debug!(chars = response.len(), "Completion received");
        Ok(response.to_string())
    }
}

pub fn create_responder(config: &Config) -> Result<Arc<dyn Responder>> {
    match config.api_provider.as_str() {
        "openai" => {
            let client: openai::CompletionsClient = openai::CompletionsClient::builder()
                .api_key(&config.api_key)
                .base_url(&config.api_url)
                .build()?;
            Ok(RigResponder::new(config, client) as Arc<dyn Responder>)
        }
        "gemini" => {
            let client = gemini::Client::new(&config.api_key)?;
            Ok(RigResponder::new(config, client) as Arc<dyn Responder>)
        }
        _ => {
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&config.api_key)
                .base_url(&config.api_url)
                .build()?;
            Ok(RigResponder::new(config, client) as Arc<dyn Responder>)
        }
    }
}
