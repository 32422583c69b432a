use crate::store::{NewSet, NewWorkout, NewWorkoutExercise, Store};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

const TEMP_PREFIX: &str = "temp_";

/// How long a replayed temporary id keeps resolving to its real id.
const RESOLVED_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Outbox I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Outbox file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    Workout,
    WorkoutExercise,
    Set,
}

impl OutboxKind {
    /// Parents replay before their children.
    const REPLAY_ORDER: [OutboxKind; 3] = [Self::Workout, Self::WorkoutExercise, Self::Set];

    /// Field of the queued data that holds the parent id.
    fn parent_field(self) -> Option<&'static str> {
        match self {
            Self::Workout => None,
            Self::WorkoutExercise => Some("workoutId"),
            Self::Set => Some("workoutExerciseId"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub kind: OutboxKind,
    /// Milliseconds since the epoch when the intent was queued.
    pub timestamp: i64,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ResolvedId {
    id: String,
    /// Milliseconds since the epoch when the parent was replayed.
    at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OutboxFile {
    #[serde(default)]
    entries: Vec<OutboxEntry>,
    #[serde(default)]
    last_sync: Option<i64>,
    #[serde(default)]
    resolved: HashMap<String, ResolvedId>,
}

/// Destination that queued intents are replayed against. Returns the id the
/// destination assigned to the written record.
#[async_trait]
pub trait OutboxSink: Send + Sync {
    async fn replay(&self, entry: &OutboxEntry) -> anyhow::Result<String>;
}

#[async_trait]
impl OutboxSink for Store {
    async fn replay(&self, entry: &OutboxEntry) -> anyhow::Result<String> {
        let id = match entry.kind {
            OutboxKind::Workout => {
                let workout: NewWorkout = serde_json::from_value(entry.data.clone())?;
                self.create_workout(workout).await?.id
            }
            OutboxKind::WorkoutExercise => {
                let link: NewWorkoutExercise = serde_json::from_value(entry.data.clone())?;
                self.add_exercise_to_workout(&link.workout_id, &link.exercise_id, link.exercise_order)
                    .await?
                    .id
            }
            OutboxKind::Set => {
                let set: NewSet = serde_json::from_value(entry.data.clone())?;
                self.add_set(set).await?.id
            }
        };
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCount {
    pub success: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub workouts: SyncCount,
    pub exercises: SyncCount,
    pub sets: SyncCount,
}

impl SyncReport {
    pub fn failed(&self) -> u32 {
        self.workouts.failed + self.exercises.failed + self.sets.failed
    }

    fn count_mut(&mut self, kind: OutboxKind) -> &mut SyncCount {
        match kind {
            OutboxKind::Workout => &mut self.workouts,
            OutboxKind::WorkoutExercise => &mut self.exercises,
            OutboxKind::Set => &mut self.sets,
        }
    }
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_PREFIX)
}

fn temporary_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}_{}", TEMP_PREFIX, now.timestamp_millis(), &suffix[..9])
}

/// Durable queue of writes that could not reach the store. The whole file is
/// rewritten after every change; the last writer wins.
///
/// Queued ids double as temporary ids for the records they will become, so a
/// set can name a workout exercise that is itself still queued. Replayed
/// parents are remembered and their children rewritten before they replay.
pub struct Outbox {
    path: PathBuf,
    state: Mutex<OutboxFile>,
    draining: Mutex<()>,
}

impl Outbox {
    pub async fn open(path: PathBuf) -> Result<Self, OutboxError> {
        let state = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let file: OutboxFile = serde_json::from_str(&content)?;
            info!("Loaded {} queued intents from {}", file.entries.len(), path.display());
            file
        } else {
            OutboxFile::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
            draining: Mutex::new(()),
        })
    }

    async fn save(&self, state: &OutboxFile) -> Result<(), OutboxError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }

    pub async fn enqueue<T: Serialize>(&self, kind: OutboxKind, data: &T) -> Result<String, OutboxError> {
        let now = Utc::now();
        let entry = OutboxEntry {
            id: temporary_id(now),
            kind,
            timestamp: now.timestamp_millis(),
            data: serde_json::to_value(data)?,
        };
        let id = entry.id.clone();

        let mut state = self.state.lock().await;
        state.entries.push(entry);
        self.save(&state).await?;
        info!(id = %id, kind = ?kind, "Intent queued for later sync");
        Ok(id)
    }

    pub async fn pending(&self, kind: OutboxKind) -> Vec<OutboxEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Real id of a temporary id whose record has been replayed.
    pub async fn resolve(&self, temporary: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .resolved
            .get(temporary)
            .map(|r| r.id.clone())
    }

    pub async fn clear(&self, kind: OutboxKind) -> Result<(), OutboxError> {
        let mut state = self.state.lock().await;
        state.entries.retain(|e| e.kind != kind);
        self.save(&state).await
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .await
            .last_sync
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Points the entry at the real id of its parent. Errs with the parent id
    /// while that parent has not been replayed.
    async fn with_resolved_parent(&self, mut entry: OutboxEntry) -> Result<OutboxEntry, String> {
        let Some(field) = entry.kind.parent_field() else {
            return Ok(entry);
        };
        let Some(parent) = entry.data.get(field).and_then(Value::as_str).map(String::from) else {
            return Ok(entry);
        };
        if !is_temporary_id(&parent) {
            return Ok(entry);
        }

        let real = self.resolve(&parent).await.ok_or(parent)?;
        if let Some(slot) = entry.data.get_mut(field) {
            *slot = Value::String(real);
        }
        Ok(entry)
    }

    /// Drops a replayed entry and remembers the id it was given.
    async fn confirm(&self, entry: &OutboxEntry, real_id: String) -> Result<(), OutboxError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        state.entries.retain(|e| e.id != entry.id);
        if entry.kind != OutboxKind::Set {
            state.resolved.insert(
                entry.id.clone(),
                ResolvedId {
                    id: real_id,
                    at: now.timestamp_millis(),
                },
            );
        }
        let cutoff = (now - Duration::days(RESOLVED_RETENTION_DAYS)).timestamp_millis();
        state.resolved.retain(|_, r| r.at >= cutoff);
        self.save(&state).await
    }

    /// Replays workouts, then workout exercises, then sets, each in insertion
    /// order. An entry leaves the queue only once the sink has accepted it,
    /// and a child waits while its parent is still queued. Concurrent drains
    /// run one after another.
    pub async fn drain(&self, sink: &dyn OutboxSink) -> Result<SyncReport, OutboxError> {
        let _draining = self.draining.lock().await;
        let mut report = SyncReport::default();

        for kind in OutboxKind::REPLAY_ORDER {
            for entry in self.pending(kind).await {
                let entry = match self.with_resolved_parent(entry).await {
                    Ok(entry) => entry,
                    Err(parent) => {
                        warn!(kind = ?kind, parent = %parent, "Parent not synced yet, intent stays queued");
                        report.count_mut(kind).failed += 1;
                        continue;
                    }
                };
                match sink.replay(&entry).await {
                    Ok(real_id) => {
                        self.confirm(&entry, real_id).await?;
                        report.count_mut(kind).success += 1;
                    }
                    Err(e) => {
                        error!(id = %entry.id, kind = ?kind, "Failed to sync queued intent: {:#}", e);
                        report.count_mut(kind).failed += 1;
                    }
                }
            }
        }

        if report.failed() == 0 {
            let mut state = self.state.lock().await;
            state.last_sync = Some(Utc::now().timestamp_millis());
            self.save(&state).await?;
        } else {
            warn!(failed = report.failed(), "Outbox sync left intents queued");
        }
        info!(
            workouts = report.workouts.success,
            exercises = report.exercises.success,
            sets = report.sets.success,
            "Outbox sync finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Accepts everything except entries whose data carries `"fail": true`,
    /// and hands out `real-<name>` as the written id.
    #[derive(Default)]
    struct RecordingSink {
        seen: StdMutex<Vec<Value>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|data| data["name"].as_str().unwrap_or("").to_string())
                .collect()
        }
    }

    #[async_trait]
    impl OutboxSink for RecordingSink {
        async fn replay(&self, entry: &OutboxEntry) -> anyhow::Result<String> {
            if entry.data["fail"] == true {
                anyhow::bail!("store unreachable");
            }
            self.seen.lock().unwrap().push(entry.data.clone());
            Ok(format!("real-{}", entry.data["name"].as_str().unwrap_or("")))
        }
    }

    fn pull_day() -> NewWorkout {
        NewWorkout {
            user_id: "u1".to_string(),
            workout_name: "Pull day".to_string(),
            workout_date: Utc::now(),
            duration_minutes: None,
            notes: None,
        }
    }

    #[test]
    fn temporary_ids_are_recognised() {
        let id = temporary_id(Utc::now());
        assert!(is_temporary_id(&id));
        assert_eq!(id.rsplit('_').next().unwrap().len(), 9);
        assert!(!is_temporary_id("0b6a3c52-3f4e-4d7a-9a51-2f9e8b7c6d5e"));
    }

    #[tokio::test]
    async fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.json");
        let outbox = Outbox::open(path.clone()).await.unwrap();
        let id = outbox
            .enqueue(OutboxKind::Workout, &json!({"name": "legs"}))
            .await
            .unwrap();
        outbox
            .enqueue(OutboxKind::Set, &json!({"name": "set"}))
            .await
            .unwrap();

        let reopened = Outbox::open(path).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.pending(OutboxKind::Workout).await[0].id, id);

        reopened.clear(OutboxKind::Set).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert!(reopened.pending(OutboxKind::Set).await.is_empty());
    }

    #[tokio::test]
    async fn drain_replays_workouts_before_sets_and_keeps_failures() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        outbox.enqueue(OutboxKind::Set, &json!({"name": "s1"})).await.unwrap();
        outbox.enqueue(OutboxKind::Workout, &json!({"name": "w1"})).await.unwrap();
        outbox
            .enqueue(OutboxKind::Workout, &json!({"name": "w2", "fail": true}))
            .await
            .unwrap();
        outbox.enqueue(OutboxKind::Workout, &json!({"name": "w3"})).await.unwrap();

        let sink = RecordingSink::default();
        let report = outbox.drain(&sink).await.unwrap();

        assert_eq!(sink.names(), vec!["w1", "w3", "s1"]);
        assert_eq!(report.workouts, SyncCount { success: 2, failed: 1 });
        assert_eq!(report.sets, SyncCount { success: 1, failed: 0 });
        assert_eq!(outbox.len().await, 1);
        assert!(outbox.last_sync().await.is_none());
    }

    #[tokio::test]
    async fn clean_drain_records_sync_time() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        outbox.enqueue(OutboxKind::Workout, &json!({"name": "w"})).await.unwrap();

        let report = outbox.drain(&RecordingSink::default()).await.unwrap();
        assert_eq!(report.failed(), 0);
        assert!(outbox.last_sync().await.is_some());
    }

    #[tokio::test]
    async fn concurrent_drains_write_each_intent_once() {
        let dir = tempfile::tempdir().unwrap();
        let (_db_dir, store) = test_store().await;
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        for _ in 0..5 {
            outbox.enqueue(OutboxKind::Workout, &pull_day()).await.unwrap();
        }

        let (first, second) = tokio::join!(outbox.drain(store.as_ref()), outbox.drain(store.as_ref()));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.workouts.success + second.workouts.success, 5);
        assert_eq!(first.failed() + second.failed(), 0);
        assert_eq!(store.recent_workouts("u1", 50).await.unwrap().len(), 5);
        assert_eq!(outbox.len().await, 0);
    }

    #[tokio::test]
    async fn queued_children_follow_their_replayed_parent() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        let workout = outbox.enqueue(OutboxKind::Workout, &json!({"name": "w"})).await.unwrap();
        let link = outbox
            .enqueue(
                OutboxKind::WorkoutExercise,
                &json!({"name": "link", "workoutId": workout, "exerciseId": "bench"}),
            )
            .await
            .unwrap();
        outbox
            .enqueue(OutboxKind::Set, &json!({"name": "s", "workoutExerciseId": link}))
            .await
            .unwrap();

        let sink = RecordingSink::default();
        let report = outbox.drain(&sink).await.unwrap();

        assert_eq!(report.failed(), 0);
        assert_eq!(report.exercises.success, 1);
        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(seen[1]["workoutId"], "real-w");
        assert_eq!(seen[2]["workoutExerciseId"], "real-link");
        assert_eq!(outbox.resolve(&workout).await.as_deref(), Some("real-w"));
        assert_eq!(outbox.resolve(&link).await.as_deref(), Some("real-link"));
    }

    #[tokio::test]
    async fn set_with_unsynced_parent_stays_queued() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        outbox
            .enqueue(
                OutboxKind::WorkoutExercise,
                &json!({"name": "link", "workoutId": "w", "fail": true}),
            )
            .await
            .unwrap();
        let link = outbox.pending(OutboxKind::WorkoutExercise).await[0].id.clone();
        outbox
            .enqueue(OutboxKind::Set, &json!({"name": "s", "workoutExerciseId": link}))
            .await
            .unwrap();
        outbox
            .enqueue(
                OutboxKind::Set,
                &json!({"name": "lost", "workoutExerciseId": "temp_1700000000000_abcdefghi"}),
            )
            .await
            .unwrap();

        let sink = RecordingSink::default();
        let report = outbox.drain(&sink).await.unwrap();

        assert!(sink.names().is_empty());
        assert_eq!(report.sets, SyncCount { success: 0, failed: 2 });
        assert_eq!(outbox.len().await, 3);
        let queued = outbox.pending(OutboxKind::Set).await;
        assert_eq!(queued[0].data["workoutExerciseId"], link.as_str());
        assert!(outbox.last_sync().await.is_none());
    }

    #[tokio::test]
    async fn store_sink_writes_queued_workout_chain() {
        let dir = tempfile::tempdir().unwrap();
        let (_db_dir, store) = test_store().await;
        let outbox = Outbox::open(dir.path().join("outbox.json")).await.unwrap();
        let exercise = store.create_exercise("Deadlift", "back").await.unwrap();

        let workout = outbox.enqueue(OutboxKind::Workout, &pull_day()).await.unwrap();
        let link = NewWorkoutExercise {
            workout_id: workout.clone(),
            exercise_id: exercise.id,
            exercise_order: 1,
        };
        let link = outbox.enqueue(OutboxKind::WorkoutExercise, &link).await.unwrap();
        let set = NewSet {
            workout_exercise_id: link.clone(),
            set_number: 1,
            weight_kg: Some(140.0),
            reps: Some(5),
            rpe: None,
        };
        outbox.enqueue(OutboxKind::Set, &set).await.unwrap();

        let report = outbox.drain(store.as_ref()).await.unwrap();
        assert_eq!(report.failed(), 0);
        assert_eq!(report.sets.success, 1);
        assert_eq!(outbox.len().await, 0);

        let saved = store.recent_workouts("u1", 5).await.unwrap();
        assert_eq!(saved[0].workout_name, "Pull day");
        assert_eq!(outbox.resolve(&workout).await, Some(saved[0].id.clone()));
        let real_link = outbox.resolve(&link).await.unwrap();
        assert!(!is_temporary_id(&real_link));
    }
}
