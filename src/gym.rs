mod outbox;
mod records;
mod streak;

use crate::entity::workouts;
use crate::store::{Store, to_rfc3339};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub use outbox::{Outbox, OutboxKind, is_temporary_id};
pub use records::check_and_update_pr;
pub use streak::current_streak;

const RECENT_SHOWN: usize = 5;
const STREAK_HISTORY: u64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStats {
    pub weekly_workouts: usize,
    pub monthly_workouts: usize,
}

pub async fn workout_stats(store: &Store, user_id: &str, now: DateTime<Utc>) -> Result<WorkoutStats> {
    let monthly = store
        .workouts_since(user_id, now - Duration::days(30))
        .await?;
    let week_start = (now - Duration::days(7)).timestamp_micros();
    let weekly = monthly
        .iter()
        .filter(|w| w.workout_date_us >= week_start)
        .count();
    Ok(WorkoutStats {
        weekly_workouts: weekly,
        monthly_workouts: monthly.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSummary {
    pub id: String,
    pub workout_name: String,
    pub workout_date: Option<String>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

impl From<&workouts::Model> for WorkoutSummary {
    fn from(w: &workouts::Model) -> Self {
        Self {
            id: w.id.clone(),
            workout_name: w.workout_name.clone(),
            workout_date: to_rfc3339(w.workout_date_us),
            duration_minutes: w.duration_minutes,
            notes: w.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub recent_workouts: Vec<WorkoutSummary>,
    #[serde(flatten)]
    pub stats: WorkoutStats,
    pub current_streak: u32,
}

pub async fn dashboard(store: &Store, user_id: &str, now: DateTime<Utc>) -> Result<Dashboard> {
    let history = store.recent_workouts(user_id, STREAK_HISTORY).await?;
    let dates: Vec<_> = history
        .iter()
        .filter_map(|w| DateTime::<Utc>::from_timestamp_micros(w.workout_date_us))
        .map(|t| t.date_naive())
        .collect();

    Ok(Dashboard {
        recent_workouts: history.iter().take(RECENT_SHOWN).map(WorkoutSummary::from).collect(),
        stats: workout_stats(store, user_id, now).await?,
        current_streak: current_streak(&dates, now.date_naive()),
    })
}
