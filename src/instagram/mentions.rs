use super::{Insights, MediaSource};
use crate::store::{NewMention, Store};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Share of followers assumed to have seen a story when insights are empty.
const FOLLOWER_VIEW_RATE: f64 = 0.4;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

pub struct MentionHandler {
    store: Arc<Store>,
    media: Arc<dyn MediaSource>,
}

impl MentionHandler {
    pub fn new(store: Arc<Store>, media: Arc<dyn MediaSource>) -> Self {
        Self { store, media }
    }

    pub async fn process(&self, payload: &WebhookPayload) -> Result<()> {
        for entry in &payload.entry {
            info!(entry_id = %entry.id, "Processing webhook entry");
            for change in &entry.changes {
                match change.field.as_str() {
                    "mentions" => self.handle_mention(&change.value, &entry.id).await?,
                    "story_insights" => self.handle_story_insights(&change.value).await?,
                    other => info!(field = other, "Webhook change not processed"),
                }
            }
        }
        Ok(())
    }

    async fn handle_mention(&self, mention: &Value, page_id: &str) -> Result<()> {
        let Some(media_id) = mention["media_id"].as_str() else {
            warn!("No media_id in mention, skipping");
            return Ok(());
        };

        let Some(brand) = self.store.brand_by_account_id(page_id).await? else {
            warn!(page_id, "Brand not found for Instagram account, saving for review");
            let mut raw = mention.clone();
            if let Value::Object(ref mut map) = raw {
                map.insert("page_id".to_string(), json!(page_id));
            }
            self.store
                .insert_mention(NewMention {
                    media_id: media_id.to_string(),
                    raw_webhook_data: raw.to_string(),
                    processed: false,
                    ..Default::default()
                })
                .await?;
            return Ok(());
        };

        let token = brand.instagram_access_token.as_deref();
        let details = match token {
            Some(token) => self.media.story_details(media_id, token).await,
            None => None,
        };
        let username = details
            .as_ref()
            .and_then(|d| d.username.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let story_url = details.as_ref().and_then(|d| d.permalink.clone());
        info!(brand = %brand.business_name, username = %username, "Story mention received");

        let submission = self.store.latest_pending_for_brand(&brand.id).await?;
        if let Some(ref submission) = submission {
            let insights = match token {
                Some(token) => self.media.story_insights(media_id, token).await,
                None => Insights::default(),
            };
            let views = estimated_views(insights.impressions, submission.instagram_followers);
            self.store
                .verify_submission(&submission.id, views, story_url.as_deref(), 100)
                .await?;
            info!(submission_id = %submission.id, "Submission verified from mention");
        } else {
            warn!(brand_id = %brand.id, "No pending submission for this brand");
        }

        self.store
            .insert_mention(NewMention {
                business_id: Some(brand.id.clone()),
                submission_id: submission.map(|s| s.id),
                media_id: media_id.to_string(),
                user_id: details.and_then(|d| d.owner).map(|o| o.id),
                username: Some(username),
                views_count: 0,
                story_url,
                raw_webhook_data: mention.to_string(),
                processed: true,
            })
            .await?;
        Ok(())
    }

    async fn handle_story_insights(&self, insights: &Value) -> Result<()> {
        let (Some(media_id), Some(impressions)) =
            (insights["media_id"].as_str(), insights["impressions"].as_i64())
        else {
            warn!("Story insights without media_id or impressions, skipping");
            return Ok(());
        };

        let submission_id = self
            .store
            .mention_by_media_id(media_id)
            .await?
            .and_then(|m| m.submission_id);
        match submission_id {
            Some(id) => {
                self.store.update_submission_views(&id, impressions).await?;
                info!(submission_id = %id, impressions, "Story views updated");
            }
            None => info!(media_id, "No submission linked to media"),
        }
        Ok(())
    }
}

fn estimated_views(impressions: i64, followers: Option<i64>) -> i64 {
    if impressions > 0 {
        impressions
    } else {
        (followers.unwrap_or(0) as f64 * FOLLOWER_VIEW_RATE).round() as i64
    }
}
