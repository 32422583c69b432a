mod graph;
mod mentions;
mod oauth;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use graph::GraphClient;
pub use mentions::{MentionHandler, WebhookPayload};
pub use oauth::{OAuthFlow, OAuthSettings};

/// Outcome of looking for a story of `username` that tags a brand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoryResult {
    NotFound {
        reason: String,
    },
    Untagged,
    Tagged {
        story_id: String,
        views: i64,
        timestamp: Option<String>,
        url: Option<String>,
    },
}

#[async_trait]
pub trait StoryLookup: Send + Sync {
    async fn search_user_story(&self, username: &str, business_handle: &str) -> Result<StoryResult>;

    async fn health_check(&self) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct StoryDetails {
    pub id: String,
    pub permalink: Option<String>,
    pub timestamp: Option<String>,
    pub username: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Owner {
    pub id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Insights {
    pub impressions: i64,
    pub reach: i64,
}

/// Per-media reads made with a brand's own token.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn story_details(&self, media_id: &str, access_token: &str) -> Option<StoryDetails>;

    async fn story_insights(&self, media_id: &str, access_token: &str) -> Insights;
}
