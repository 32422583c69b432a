use super::oauth::{OAuthApi, Page};
use super::{Insights, MediaSource, StoryDetails, StoryLookup, StoryResult};
use crate::config::InstagramConfig;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Default lifetime of a long-lived token when the exchange omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 60 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
struct Story {
    id: String,
    timestamp: Option<String>,
    permalink: Option<String>,
}

pub struct GraphClient {
    base_url: String,
    access_token: String,
    business_account_id: String,
    client: reqwest::Client,
}

impl GraphClient {
    pub fn new(config: &InstagramConfig) -> Self {
        info!(
            business_account_id = %config.business_account_id,
            "Instagram Graph client initialized"
        );
        Self {
            base_url: config.graph_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            business_account_id: config.business_account_id.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn request(
        &self,
        path: &str,
        params: &[(&str, &str)],
        access_token: Option<&str>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = self
            .client
            .get(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .query(params);
        if let Some(token) = access_token {
            builder = builder.query(&[("access_token", token)]);
        }
        let response = builder
            .send()
            .await
            .with_context(|| format!("Graph request to {} failed", path))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// Like `request`, but any non-success status or `error` body is an error.
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
        access_token: Option<&str>,
    ) -> Result<Value> {
        let (status, body) = self.request(path, params, access_token).await?;
        if let Some(message) = error_message(&body) {
            bail!("Facebook error: {}", message);
        }
        if !status.is_success() {
            bail!("Graph API returned HTTP {}", status);
        }
        Ok(body)
    }

    /// Resolves a public business/creator account id through business discovery.
    async fn discover_user(&self, username: &str) -> Result<Option<String>> {
        let fields = format!(
            "business_discovery.username({}){{id,username}}",
            username
        );
        let (status, body) = self
            .request(
                &self.business_account_id,
                &[("fields", fields.as_str())],
                Some(&self.access_token),
            )
            .await?;

        if let Some(message) = error_message(&body) {
            debug!(username, "Business discovery failed: {}", message);
            return Ok(None);
        }
        if !status.is_success() {
            return Ok(None);
        }

        Ok(body["business_discovery"]["id"].as_str().map(String::from))
    }

    async fn user_stories(&self, user_id: &str) -> Result<Vec<Story>> {
        let (status, body) = self
            .request(
                &format!("{}/stories", user_id),
                &[("fields", "id,media_type,media_url,timestamp,permalink")],
                Some(&self.access_token),
            )
            .await?;

        if status == StatusCode::NOT_FOUND {
            info!(user_id, "No stories found for user");
            return Ok(Vec::new());
        }
        if let Some(message) = error_message(&body) {
            bail!("Error getting user stories: {}", message);
        }
        Ok(serde_json::from_value(body["data"].clone()).unwrap_or_default())
    }

    async fn story_mentions(&self, story_id: &str) -> Vec<String> {
        match self
            .get_json(
                story_id,
                &[("fields", "mentions{username}")],
                Some(&self.access_token),
            )
            .await
        {
            Ok(body) => mention_usernames(&body),
            Err(e) => {
                warn!(story_id, "Error getting story mentions: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn find_story_with_tag(&self, stories: Vec<Story>, handle: &str) -> Option<Story> {
        let handle = handle.trim_start_matches('@');
        for story in stories {
            let mentions = self.story_mentions(&story.id).await;
            if mentions.iter().any(|m| m == handle) {
                return Some(story);
            }
        }
        None
    }

    async fn insights(&self, media_id: &str, access_token: &str) -> Insights {
        match self
            .get_json(
                &format!("{}/insights", media_id),
                &[("metric", "impressions,reach")],
                Some(access_token),
            )
            .await
        {
            Ok(body) => Insights {
                impressions: metric_value(&body, "impressions"),
                reach: metric_value(&body, "reach"),
            },
            Err(e) => {
                warn!(media_id, "Could not get story insights: {:#}", e);
                Insights::default()
            }
        }
    }
}

#[async_trait]
impl StoryLookup for GraphClient {
    async fn search_user_story(&self, username: &str, business_handle: &str) -> Result<StoryResult> {
        info!(username, business_handle, "Searching for story");

        let Some(user_id) = self.discover_user(username).await? else {
            return Ok(StoryResult::NotFound {
                reason: "user_not_found".to_string(),
            });
        };

        let stories = self.user_stories(&user_id).await?;
        if stories.is_empty() {
            return Ok(StoryResult::NotFound {
                reason: "no_stories".to_string(),
            });
        }

        let Some(story) = self.find_story_with_tag(stories, business_handle).await else {
            return Ok(StoryResult::Untagged);
        };

        let views = self.insights(&story.id, &self.access_token).await.impressions;
        Ok(StoryResult::Tagged {
            story_id: story.id,
            views,
            timestamp: story.timestamp,
            url: story.permalink,
        })
    }

    async fn health_check(&self) -> Result<Value> {
        let body = self
            .get_json(
                &self.business_account_id,
                &[("fields", "id,username")],
                Some(&self.access_token),
            )
            .await?;
        info!("Instagram API health check passed");
        Ok(body)
    }
}

#[async_trait]
impl MediaSource for GraphClient {
    async fn story_details(&self, media_id: &str, access_token: &str) -> Option<StoryDetails> {
        let fields = "id,media_type,media_url,permalink,timestamp,username,owner";
        match self.get_json(media_id, &[("fields", fields)], Some(access_token)).await {
            Ok(body) => serde_json::from_value(body).ok(),
            Err(e) => {
                warn!(media_id, "Error getting story details: {:#}", e);
                None
            }
        }
    }

    async fn story_insights(&self, media_id: &str, access_token: &str) -> Insights {
        self.insights(media_id, access_token).await
    }
}

#[async_trait]
impl OAuthApi for GraphClient {
    async fn exchange_code(
        &self,
        app_id: &str,
        app_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<String> {
        let (_, body) = self
            .request(
                "oauth/access_token",
                &[
                    ("client_id", app_id),
                    ("redirect_uri", redirect_uri),
                    ("client_secret", app_secret),
                    ("code", code),
                ],
                None,
            )
            .await?;
        if let Some(message) = error_message(&body) {
            bail!("Facebook error: {}", message);
        }
        body["access_token"]
            .as_str()
            .map(String::from)
            .context("No access token received from Facebook")
    }

    async fn long_lived_token(
        &self,
        app_id: &str,
        app_secret: &str,
        short_lived: &str,
    ) -> Result<(String, i64)> {
        let body = self
            .get_json(
                "oauth/access_token",
                &[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", app_id),
                    ("client_secret", app_secret),
                    ("fb_exchange_token", short_lived),
                ],
                None,
            )
            .await?;
        let token = body["access_token"]
            .as_str()
            .context("No long-lived token received from Facebook")?;
        let expires_in = body["expires_in"]
            .as_i64()
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok((token.to_string(), expires_in))
    }

    async fn pages(&self, user_token: &str) -> Result<Vec<Page>> {
        let body = self.get_json("me/accounts", &[], Some(user_token)).await?;
        Ok(serde_json::from_value(body["data"].clone()).unwrap_or_default())
    }

    async fn page_instagram_account(&self, page_id: &str, page_token: &str) -> Result<Option<String>> {
        let body = self
            .get_json(
                page_id,
                &[("fields", "instagram_business_account")],
                Some(page_token),
            )
            .await?;
        Ok(body["instagram_business_account"]["id"]
            .as_str()
            .map(String::from))
    }

    async fn account_username(&self, account_id: &str, token: &str) -> Result<Option<String>> {
        let body = self
            .get_json(
                account_id,
                &[("fields", "username,name,profile_picture_url")],
                Some(token),
            )
            .await?;
        Ok(body["username"].as_str().map(String::from))
    }
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    Some(
        error["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
    )
}

fn mention_usernames(body: &Value) -> Vec<String> {
    body["mentions"]["data"]
        .as_array()
        .map(|mentions| {
            mentions
                .iter()
                .filter_map(|m| m["username"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// First value of the named metric in an insights response, or 0.
fn metric_value(body: &Value, name: &str) -> i64 {
    body["data"]
        .as_array()
        .and_then(|metrics| metrics.iter().find(|m| m["name"] == name))
        .and_then(|m| m["values"][0]["value"].as_i64())
        .unwrap_or(0)
}
