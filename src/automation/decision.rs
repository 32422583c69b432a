use crate::entity::submissions;
use crate::instagram::StoryResult;
use crate::store::Store;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

pub const NOT_TAGGED_REASON: &str = "Story found but business not tagged";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    Verified { views: i64, url: Option<String> },
    Rejected { reason: String },
    Pending { reason: String },
}

/// Applies a story lookup to a pending submission.
pub async fn apply(
    store: &Store,
    submission: &submissions::Model,
    result: &StoryResult,
    confidence: i32,
) -> Result<Decision> {
    match result {
        StoryResult::Tagged { views, url, .. } => {
            store
                .verify_submission(&submission.id, *views, url.as_deref(), confidence)
                .await?;
            info!(username = %submission.username, views, "Auto-verified");
            Ok(Decision::Verified {
                views: *views,
                url: url.clone(),
            })
        }
        StoryResult::Untagged => {
            store
                .reject_submission(&submission.id, Some(NOT_TAGGED_REASON))
                .await?;
            info!(username = %submission.username, "Auto-rejected, business not tagged");
            Ok(Decision::Rejected {
                reason: NOT_TAGGED_REASON.to_string(),
            })
        }
        StoryResult::NotFound { reason } => {
            store.touch_submission(&submission.id).await?;
            info!(username = %submission.username, reason = %reason, "Still pending");
            Ok(Decision::Pending {
                reason: reason.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use chrono::Utc;

    #[tokio::test]
    async fn each_lookup_outcome_maps_to_a_status() {
        let (_dir, store) = test_store().await;
        let brand = store.insert_brand("Cafe", "cafe.tlv", None).await.unwrap();
        let now = Utc::now();
        let a = store.insert_submission(&brand.id, "a", None, now).await.unwrap();
        let b = store.insert_submission(&brand.id, "b", None, now).await.unwrap();
        let c = store.insert_submission(&brand.id, "c", None, now).await.unwrap();

        let tagged = StoryResult::Tagged {
            story_id: "s1".to_string(),
            views: 77,
            timestamp: None,
            url: Some("https://instagram.com/s/1".to_string()),
        };
        assert!(matches!(
            apply(&store, &a, &tagged, 95).await.unwrap(),
            Decision::Verified { views: 77, .. }
        ));
        assert!(matches!(
            apply(&store, &b, &StoryResult::Untagged, 95).await.unwrap(),
            Decision::Rejected { .. }
        ));
        let not_found = StoryResult::NotFound {
            reason: "no_stories".to_string(),
        };
        assert_eq!(
            apply(&store, &c, &not_found, 95).await.unwrap(),
            Decision::Pending {
                reason: "no_stories".to_string()
            }
        );

        let a = store.submission_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!((a.status.as_str(), a.ai_confidence), ("verified", 95));
        let b = store.submission_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(b.status, "rejected");
        let c = store.submission_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(c.status, "pending");
        assert!(c.last_checked_us.is_some());
    }
}
