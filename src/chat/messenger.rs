use crate::config::{EvolutionConfig, TwilioConfig};
use crate::entity::businesses;
use crate::utils::{split_message, whatsapp_address};
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;

/// Twilio rejects message bodies longer than this.
pub const TWILIO_MAX_BODY: usize = 1600;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Provider returned HTTP {0}: {1}")]
    Http(u16, String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Business is missing {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `body` to `to` on behalf of `business`.
    async fn send_text(
        &self,
        business: &businesses::Model,
        to: &str,
        body: &str,
    ) -> Result<(), MessengerError>;
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, MessengerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MessengerError::Http(status.as_u16(), body))
}

pub struct TwilioMessenger {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioMessenger {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send_text(
        &self,
        business: &businesses::Model,
        to: &str,
        body: &str,
    ) -> Result<(), MessengerError> {
        let from = business
            .twilio_phone_number
            .as_deref()
            .ok_or(MessengerError::NotConfigured("a Twilio number"))?;
        let (from, to) = (whatsapp_address(from), whatsapp_address(to));

        for chunk in split_message(body, TWILIO_MAX_BODY) {
            let params = [("To", to.as_str()), ("From", from.as_str()), ("Body", chunk.as_str())];
            let response = self
                .client
                .post(self.messages_url())
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&params)
                .send()
                .await?;
            let response = check(response).await?;
            let sid = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["sid"].as_str().map(String::from));
            info!(to = %to, sid = ?sid, "Twilio message sent");
        }
        Ok(())
    }
}

pub struct EvolutionMessenger {
    config: EvolutionConfig,
    client: reqwest::Client,
}

impl EvolutionMessenger {
    pub fn new(config: EvolutionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Messenger for EvolutionMessenger {
    async fn send_text(
        &self,
        business: &businesses::Model,
        to: &str,
        body: &str,
    ) -> Result<(), MessengerError> {
        let instance = business
            .evolution_instance_id
            .as_deref()
            .ok_or(MessengerError::NotConfigured("an Evolution instance"))?;
        let token = business
            .evolution_instance_token
            .as_deref()
            .ok_or(MessengerError::NotConfigured("an Evolution instance token"))?;

        let url = format!(
            "{}/message/sendText/{}",
            self.config.api_url.trim_end_matches('/'),
            instance
        );
        let response = self
            .client
            .post(url)
            .header("apikey", token)
            .json(&json!({ "number": to, "text": body }))
            .send()
            .await?;
        check(response).await?;
        info!(to = %to, instance = %instance, "Evolution message sent");
        Ok(())
    }
}
