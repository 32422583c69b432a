use crate::config::InstagramConfig;
use crate::store::Store;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub access_token: String,
}

/// Graph endpoints used while connecting a brand's Instagram account.
#[async_trait]
pub trait OAuthApi: Send + Sync {
    async fn exchange_code(
        &self,
        app_id: &str,
        app_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<String>;

    /// Returns the long-lived token and its lifetime in seconds.
    async fn long_lived_token(
        &self,
        app_id: &str,
        app_secret: &str,
        short_lived: &str,
    ) -> Result<(String, i64)>;

    async fn pages(&self, user_token: &str) -> Result<Vec<Page>>;

    async fn page_instagram_account(&self, page_id: &str, page_token: &str) -> Result<Option<String>>;

    async fn account_username(&self, account_id: &str, token: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub app_id: String,
    pub app_secret: String,
    pub redirect_uri: String,
}

impl OAuthSettings {
    pub fn from_config(config: &InstagramConfig) -> Option<Self> {
        Some(Self {
            app_id: config.app_id.clone()?,
            app_secret: config.app_secret.clone()?,
            redirect_uri: config.redirect_uri.clone()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub instagram_username: Option<String>,
    pub instagram_account_id: String,
    pub business_name: String,
    pub expires_at: DateTime<Utc>,
}

pub struct OAuthFlow {
    store: Arc<Store>,
    api: Arc<dyn OAuthApi>,
    settings: OAuthSettings,
}

impl OAuthFlow {
    pub fn new(store: Arc<Store>, api: Arc<dyn OAuthApi>, settings: OAuthSettings) -> Self {
        Self {
            store,
            api,
            settings,
        }
    }

    pub async fn connect(&self, code: &str, business_id: &str) -> Result<Connected> {
        if code.is_empty() || business_id.is_empty() {
            bail!("Missing code or businessId");
        }
        let OAuthSettings {
            app_id,
            app_secret,
            redirect_uri,
        } = &self.settings;

        info!(business_id, "Exchanging OAuth code for a short-lived token");
        let short_lived = self
            .api
            .exchange_code(app_id, app_secret, redirect_uri, code)
            .await?;

        let (long_lived, expires_in) = self
            .api
            .long_lived_token(app_id, app_secret, &short_lived)
            .await?;
        info!(business_id, expires_in, "Long-lived token received");

        let pages = self.api.pages(&long_lived).await?;
        if pages.is_empty() {
            bail!("No connected Facebook pages found. Make sure you have a Facebook business page.");
        }

        let mut connected = None;
        for page in &pages {
            if let Some(account_id) = self
                .api
                .page_instagram_account(&page.id, &page.access_token)
                .await?
            {
                let username = self
                    .api
                    .account_username(&account_id, &page.access_token)
                    .await?;
                connected = Some((account_id, username, page.access_token.clone()));
                break;
            }
        }
        let Some((account_id, username, page_token)) = connected else {
            bail!(
                "No Instagram Business account is linked to your Facebook pages. \
                 Link the business account to a Facebook page first."
            );
        };

        let created_at = Utc::now();
        let expires_at = created_at + Duration::seconds(expires_in);
        let brand = self
            .store
            .update_brand_token(
                business_id,
                &page_token,
                &account_id,
                username.as_deref(),
                created_at,
                expires_at,
            )
            .await
            .context("Database error")?;

        info!(
            business_id,
            account_id = %account_id,
            username = ?username,
            "Instagram account connected"
        );
        Ok(Connected {
            instagram_username: username,
            instagram_account_id: account_id,
            business_name: brand.business_name,
            expires_at,
        })
    }
}

#[cfg(test)]
mod fakes {
    use super::*;

    pub struct FakeOAuth {
        pub pages: Vec<Page>,
        pub account_for_page: Option<(String, String)>,
    }

    #[async_trait]
    impl OAuthApi for FakeOAuth {
        async fn exchange_code(&self, _: &str, _: &str, _: &str, code: &str) -> Result<String> {
            if code == "bad" {
                bail!("Facebook error: Invalid verification code format.");
            }
            Ok("short".to_string())
        }

        async fn long_lived_token(&self, _: &str, _: &str, short: &str) -> Result<(String, i64)> {
            assert_eq!(short, "short");
            Ok(("long".to_string(), 5_184_000))
        }

        async fn pages(&self, user_token: &str) -> Result<Vec<Page>> {
            assert_eq!(user_token, "long");
            Ok(self.pages.clone())
        }

        async fn page_instagram_account(&self, page_id: &str, _: &str) -> Result<Option<String>> {
            Ok(self
                .account_for_page
                .as_ref()
                .filter(|(page, _)| page == page_id)
                .map(|(_, account)| account.clone()))
        }

        async fn account_username(&self, _: &str, _: &str) -> Result<Option<String>> {
            Ok(Some("cafe.tlv".to_string()))
        }
    }
}
