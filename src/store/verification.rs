use super::{Store, new_id};
use crate::entity::{brands, instagram_mentions, submissions};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Verified,
    Rejected,
    ManualReview,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewMention {
    pub business_id: Option<String>,
    pub submission_id: Option<String>,
    pub media_id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub views_count: i64,
    pub story_url: Option<String>,
    pub raw_webhook_data: String,
    pub processed: bool,
}

impl Store {
    pub async fn insert_brand(
        &self,
        business_name: &str,
        instagram_handle: &str,
        instagram_account_id: Option<&str>,
    ) -> Result<brands::Model> {
        let record = brands::ActiveModel {
            id: Set(new_id()),
            business_name: Set(business_name.to_string()),
            instagram_handle: Set(instagram_handle.to_string()),
            location: Set(None),
            category: Set(None),
            status: Set("active".to_string()),
            instagram_account_id: Set(instagram_account_id.map(String::from)),
            instagram_access_token: Set(None),
            instagram_username: Set(None),
            token_created_at_us: Set(None),
            token_expires_at_us: Set(None),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    pub async fn active_brands(&self) -> Result<Vec<brands::Model>> {
        self.run(|db| {
            let rows = brands::Entity::find()
                .filter(brands::Column::Status.eq("active"))
                .all(db)?;
            info!("Found {} active brands", rows.len());
            Ok(rows)
        })
        .await
    }

    pub async fn brand_by_id(&self, id: &str) -> Result<Option<brands::Model>> {
        let id = id.to_string();
        self.run(move |db| Ok(brands::Entity::find_by_id(id).one(db)?))
            .await
    }

    pub async fn brand_by_account_id(&self, account_id: &str) -> Result<Option<brands::Model>> {
        let account_id = account_id.to_string();
        self.run(move |db| {
            Ok(brands::Entity::find()
                .filter(brands::Column::InstagramAccountId.eq(account_id))
                .one(db)?)
        })
        .await
    }

    pub async fn update_brand_token(
        &self,
        id: &str,
        access_token: &str,
        account_id: &str,
        username: Option<&str>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<brands::Model> {
        let id = id.to_string();
        let access_token = access_token.to_string();
        let account_id = account_id.to_string();
        let username = username.map(String::from);
        self.run(move |db| {
            let brand = brands::Entity::find_by_id(id.clone())
                .one(db)?
                .ok_or_else(|| anyhow!("Brand {} not found", id))?;
            let mut record: brands::ActiveModel = brand.into();
            record.instagram_access_token = Set(Some(access_token));
            record.instagram_account_id = Set(Some(account_id));
            record.instagram_username = Set(username);
            record.token_created_at_us = Set(Some(created_at.timestamp_micros()));
            record.token_expires_at_us = Set(Some(expires_at.timestamp_micros()));
            Ok(record.update(db)?)
        })
        .await
    }

    pub async fn insert_submission(
        &self,
        business_id: &str,
        username: &str,
        instagram_followers: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Result<submissions::Model> {
        let record = submissions::ActiveModel {
            id: Set(new_id()),
            business_id: Set(business_id.to_string()),
            username: Set(username.to_string()),
            status: Set(SubmissionStatus::Pending.to_string()),
            story_url: Set(None),
            views_count: Set(0),
            ai_confidence: Set(0),
            instagram_followers: Set(instagram_followers),
            created_at_us: Set(created_at.timestamp_micros()),
            verified_at_us: Set(None),
            last_checked_us: Set(None),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    /// Pending submissions, newest first, optionally limited to one brand.
    pub async fn pending_submissions(
        &self,
        business_id: Option<&str>,
    ) -> Result<Vec<submissions::Model>> {
        let business_id = business_id.map(String::from);
        self.run(move |db| {
            let mut query = submissions::Entity::find()
                .filter(submissions::Column::Status.eq(SubmissionStatus::Pending.as_str()))
                .order_by_desc(submissions::Column::CreatedAtUs);
            if let Some(ref id) = business_id {
                query = query.filter(submissions::Column::BusinessId.eq(id.clone()));
            }
            let rows = query.all(db)?;
            info!(business_id = ?business_id, "Found {} pending submissions", rows.len());
            Ok(rows)
        })
        .await
    }

    pub async fn submission_by_id(&self, id: &str) -> Result<Option<submissions::Model>> {
        let id = id.to_string();
        self.run(move |db| Ok(submissions::Entity::find_by_id(id).one(db)?))
            .await
    }

    pub async fn latest_pending_for_brand(
        &self,
        business_id: &str,
    ) -> Result<Option<submissions::Model>> {
        let business_id = business_id.to_string();
        self.run(move |db| {
            Ok(submissions::Entity::find()
                .filter(submissions::Column::BusinessId.eq(business_id))
                .filter(submissions::Column::Status.eq(SubmissionStatus::Pending.as_str()))
                .order_by_desc(submissions::Column::CreatedAtUs)
                .one(db)?)
        })
        .await
    }

    async fn update_submission<F>(&self, id: &str, apply: F) -> Result<submissions::Model>
    where
        F: FnOnce(&mut submissions::ActiveModel) + Send + 'static,
    {
        let id = id.to_string();
        self.run(move |db| {
            let submission = submissions::Entity::find_by_id(id.clone())
                .one(db)?
                .ok_or_else(|| anyhow!("Submission {} not found", id))?;
            let mut record: submissions::ActiveModel = submission.into();
            apply(&mut record);
            Ok(record.update(db)?)
        })
        .await
    }

    /// Records that the submission was looked at without changing its status.
    pub async fn touch_submission(&self, id: &str) -> Result<submissions::Model> {
        let now = Utc::now().timestamp_micros();
        self.update_submission(id, move |record| {
            record.last_checked_us = Set(Some(now));
        })
        .await
    }

    pub async fn verify_submission(
        &self,
        id: &str,
        views: i64,
        story_url: Option<&str>,
        confidence: i32,
    ) -> Result<submissions::Model> {
        let now = Utc::now().timestamp_micros();
        let story_url = story_url.map(String::from);
        let updated = self
            .update_submission(id, move |record| {
                record.status = Set(SubmissionStatus::Verified.to_string());
                record.verified_at_us = Set(Some(now));
                record.ai_confidence = Set(confidence);
                record.views_count = Set(views);
                record.last_checked_us = Set(Some(now));
                if story_url.is_some() {
                    record.story_url = Set(story_url);
                }
            })
            .await?;
        info!(submission_id = id, views, confidence, "Submission verified");
        Ok(updated)
    }

    pub async fn reject_submission(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<submissions::Model> {
        let now = Utc::now().timestamp_micros();
        let updated = self
            .update_submission(id, move |record| {
                record.status = Set(SubmissionStatus::Rejected.to_string());
                record.ai_confidence = Set(0);
                record.last_checked_us = Set(Some(now));
            })
            .await?;
        info!(submission_id = id, reason = ?reason, "Submission rejected");
        Ok(updated)
    }

    pub async fn mark_for_manual_review(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<submissions::Model> {
        let now = Utc::now().timestamp_micros();
        let updated = self
            .update_submission(id, move |record| {
                record.status = Set(SubmissionStatus::ManualReview.to_string());
                record.ai_confidence = Set(0);
                record.last_checked_us = Set(Some(now));
            })
            .await?;
        info!(submission_id = id, reason = ?reason, "Submission marked for manual review");
        Ok(updated)
    }

    pub async fn update_submission_views(&self, id: &str, views: i64) -> Result<submissions::Model> {
        self.update_submission(id, move |record| {
            record.views_count = Set(views);
        })
        .await
    }

    /// Verified submissions of a brand created at or after `since`.
    pub async fn verified_since(
        &self,
        business_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<submissions::Model>> {
        let business_id = business_id.to_string();
        self.run(move |db| {
            let mut query = submissions::Entity::find()
                .filter(submissions::Column::BusinessId.eq(business_id))
                .filter(submissions::Column::Status.eq(SubmissionStatus::Verified.as_str()))
                .order_by_desc(submissions::Column::CreatedAtUs);
            if let Some(since) = since {
                query = query.filter(submissions::Column::CreatedAtUs.gte(since.timestamp_micros()));
            }
            Ok(query.all(db)?)
        })
        .await
    }

    /// Pending submissions created strictly before `cutoff`.
    pub async fn stale_submissions(&self, cutoff: DateTime<Utc>) -> Result<Vec<submissions::Model>> {
        self.run(move |db| {
            Ok(submissions::Entity::find()
                .filter(submissions::Column::Status.eq(SubmissionStatus::Pending.as_str()))
                .filter(submissions::Column::CreatedAtUs.lt(cutoff.timestamp_micros()))
                .order_by_asc(submissions::Column::CreatedAtUs)
                .all(db)?)
        })
        .await
    }

    pub async fn insert_mention(&self, mention: NewMention) -> Result<String> {
        let record = instagram_mentions::ActiveModel {
            id: Set(new_id()),
            business_id: Set(mention.business_id),
            submission_id: Set(mention.submission_id),
            media_id: Set(mention.media_id),
            user_id: Set(mention.user_id),
            username: Set(mention.username),
            views_count: Set(mention.views_count),
            story_url: Set(mention.story_url),
            raw_webhook_data: Set(mention.raw_webhook_data),
            processed: Set(mention.processed),
            created_at_us: Set(Utc::now().timestamp_micros()),
        };
        self.run(move |db| {
            let model = record.insert(db)?;
            Ok(model.id)
        })
        .await
    }

    pub async fn mention_by_media_id(
        &self,
        media_id: &str,
    ) -> Result<Option<instagram_mentions::Model>> {
        let media_id = media_id.to_string();
        self.run(move |db| {
            Ok(instagram_mentions::Entity::find()
                .filter(instagram_mentions::Column::MediaId.eq(media_id))
                .order_by_desc(instagram_mentions::Column::CreatedAtUs)
                .one(db)?)
        })
        .await
    }
}
