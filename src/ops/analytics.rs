use super::validate::Timeframe;
use crate::entity::submissions;
use crate::store::to_rfc3339;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const COST_PER_STORY: i64 = 30;
const RECENT_LIMIT: usize = 10;

impl Timeframe {
    /// Lower bound on `created_at` for this window, `None` for all time.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Today => Some(
                now.date_naive()
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or_default()
                    .and_utc(),
            ),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStats {
    pub total_stories: usize,
    pub total_views: i64,
    pub avg_views_per_story: i64,
    pub estimated_cost: i64,
    pub views_per_cost_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSubmission {
    pub username: String,
    pub views: i64,
    pub created_at: Option<String>,
    pub verified_at: Option<String>,
}

/// `verified` is expected newest first.
pub fn summarize(verified: &[submissions::Model]) -> (StoryStats, Vec<RecentSubmission>) {
    let total_stories = verified.len();
    let total_views: i64 = verified.iter().map(|s| s.views_count).sum();
    let avg_views_per_story = if total_stories > 0 {
        (total_views as f64 / total_stories as f64).round() as i64
    } else {
        0
    };
    let estimated_cost = total_stories as i64 * COST_PER_STORY;
    let views_per_cost_unit = if estimated_cost > 0 {
        (total_views as f64 / estimated_cost as f64 * 100.0).round() / 100.0
    } else {
        0.0
    };

    let recent = verified
        .iter()
        .take(RECENT_LIMIT)
        .map(|s| RecentSubmission {
            username: s.username.clone(),
            views: s.views_count,
            created_at: to_rfc3339(s.created_at_us),
            verified_at: s.verified_at_us.and_then(to_rfc3339),
        })
        .collect();

    (
        StoryStats {
            total_stories,
            total_views,
            avg_views_per_story,
            estimated_cost,
            views_per_cost_unit,
        },
        recent,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn verified(username: &str, views: i64) -> submissions::Model {
        submissions::Model {
            id: format!("id-{}", username),
            business_id: "b".to_string(),
            username: username.to_string(),
            status: "verified".to_string(),
            story_url: None,
            views_count: views,
            ai_confidence: 95,
            instagram_followers: None,
            created_at_us: 0,
            verified_at_us: Some(1_000_000),
            last_checked_us: None,
        }
    }

    #[test]
    fn stats_round_average_and_ratio() {
        let rows = vec![verified("a", 100), verified("b", 51), verified("c", 0)];
        let (stats, recent) = summarize(&rows);

        assert_eq!(stats.total_stories, 3);
        assert_eq!(stats.total_views, 151);
        assert_eq!(stats.avg_views_per_story, 50);
        assert_eq!(stats.estimated_cost, 90);
        assert_eq!(stats.views_per_cost_unit, 1.68);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].username, "a");
        assert_eq!(recent[0].verified_at.as_deref(), Some("1970-01-01T00:00:01+00:00"));
    }

    #[test]
    fn empty_window_has_zero_ratio() {
        let (stats, recent) = summarize(&[]);
        assert_eq!(stats.estimated_cost, 0);
        assert_eq!(stats.views_per_cost_unit, 0.0);
        assert_eq!(stats.avg_views_per_story, 0);
        assert!(recent.is_empty());
    }

    #[test]
    fn recent_list_is_capped() {
        let rows: Vec<_> = (0..15).map(|i| verified(&format!("u{}", i), 10)).collect();
        assert_eq!(summarize(&rows).1.len(), 10);
    }

    #[test]
    fn windows_start_at_expected_instants() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 0).unwrap();
        assert_eq!(Timeframe::All.since(now), None);
        assert_eq!(
            Timeframe::Today.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            Timeframe::Week.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 8, 13, 45, 0).unwrap())
        );
        assert_eq!(
            Timeframe::Month.since(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 14, 13, 45, 0).unwrap())
        );
    }
}
