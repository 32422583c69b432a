use super::AppState;
use crate::gym::{self, OutboxKind, is_temporary_id};
use crate::store::{NewSet, NewWorkout, NewWorkoutExercise};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Queues an intent that could not be written and answers 202.
async fn queue<T: Serialize>(state: &AppState, kind: OutboxKind, data: &T) -> (StatusCode, Json<Value>) {
    match state.outbox.enqueue(kind, data).await {
        Ok(id) => (StatusCode::ACCEPTED, Json(json!({"queued": true, "id": id}))),
        Err(e) => {
            error!("Failed to queue intent: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Replays queued intents in the background after a write got through.
fn drain_in_background(state: &Arc<AppState>) {
    let state = state.clone();
    tokio::spawn(async move {
        if state.outbox.len().await == 0 {
            return;
        }
        if let Err(e) = state.outbox.drain(state.store.as_ref()).await {
            warn!("Opportunistic outbox sync failed: {}", e);
        }
    });
}

/// Swaps a temporary parent id for its real id once the parent has been
/// replayed. False while the parent is still queued.
async fn resolve_parent(state: &AppState, parent: &mut String) -> bool {
    if !is_temporary_id(parent) {
        return true;
    }
    match state.outbox.resolve(parent).await {
        Some(real) => {
            *parent = real;
            true
        }
        None => false,
    }
}

pub async fn create_workout(
    State(state): State<Arc<AppState>>,
    Json(workout): Json<NewWorkout>,
) -> (StatusCode, Json<Value>) {
    match state.store.create_workout(workout.clone()).await {
        Ok(saved) => {
            info!(workout_id = %saved.id, user_id = %saved.user_id, "Workout created");
            drain_in_background(&state);
            (
                StatusCode::CREATED,
                Json(json!({"id": saved.id, "queued": false})),
            )
        }
        Err(e) => {
            warn!("Store unavailable, queueing workout: {:#}", e);
            queue(&state, OutboxKind::Workout, &workout).await
        }
    }
}

pub async fn add_set(
    State(state): State<Arc<AppState>>,
    Json(mut set): Json<NewSet>,
) -> (StatusCode, Json<Value>) {
    if !resolve_parent(&state, &mut set.workout_exercise_id).await {
        return queue(&state, OutboxKind::Set, &set).await;
    }

    match state.store.add_set(set.clone()).await {
        Ok(saved) => {
            drain_in_background(&state);
            (
                StatusCode::CREATED,
                Json(json!({"id": saved.id, "queued": false})),
            )
        }
        Err(e) => {
            warn!("Store unavailable, queueing set: {:#}", e);
            queue(&state, OutboxKind::Set, &set).await
        }
    }
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match gym::dashboard(&state.store, &user_id, Utc::now()).await {
        Ok(board) => (StatusCode::OK, Json(json!(board))),
        Err(e) => {
            error!(user_id = %user_id, "Failed to load dashboard: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("{:#}", e)})),
            )
        }
    }
}

fn internal(action: &str, e: anyhow::Error) -> (StatusCode, Json<Value>) {
    error!("Failed to {}: {:#}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": format!("{:#}", e)})),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseFilter {
    muscle_group: Option<String>,
}

pub async fn list_exercises(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ExerciseFilter>,
) -> (StatusCode, Json<Value>) {
    match state.store.list_exercises(filter.muscle_group.as_deref()).await {
        Ok(rows) => {
            let exercises: Vec<Value> = rows
                .iter()
                .map(|e| {
                    json!({
                        "id": e.id,
                        "exerciseName": e.exercise_name,
                        "muscleGroup": e.muscle_group,
                        "isCustom": e.is_custom,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({"exercises": exercises})))
        }
        Err(e) => internal("list exercises", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExercise {
    exercise_name: String,
    muscle_group: String,
}

pub async fn create_exercise(
    State(state): State<Arc<AppState>>,
    Json(exercise): Json<NewExercise>,
) -> (StatusCode, Json<Value>) {
    let name = exercise.exercise_name.trim();
    if name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "exerciseName is required"})),
        );
    }
    match state.store.create_exercise(name, exercise.muscle_group.trim()).await {
        Ok(saved) => (
            StatusCode::CREATED,
            Json(json!({"id": saved.id, "isCustom": saved.is_custom})),
        ),
        Err(e) => internal("create exercise", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutExercise {
    exercise_id: String,
    #[serde(default)]
    exercise_order: i32,
}

pub async fn add_exercise(
    State(state): State<Arc<AppState>>,
    Path(workout_id): Path<String>,
    Json(entry): Json<WorkoutExercise>,
) -> (StatusCode, Json<Value>) {
    let mut link = NewWorkoutExercise {
        workout_id,
        exercise_id: entry.exercise_id,
        exercise_order: entry.exercise_order,
    };
    if !resolve_parent(&state, &mut link.workout_id).await {
        return queue(&state, OutboxKind::WorkoutExercise, &link).await;
    }

    match state
        .store
        .add_exercise_to_workout(&link.workout_id, &link.exercise_id, link.exercise_order)
        .await
    {
        Ok(saved) => {
            drain_in_background(&state);
            (
                StatusCode::CREATED,
                Json(json!({"id": saved.id, "queued": false})),
            )
        }
        Err(e) => {
            warn!("Store unavailable, queueing workout exercise: {:#}", e);
            queue(&state, OutboxKind::WorkoutExercise, &link).await
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttempt {
    exercise_id: String,
    user_id: String,
    record_type: String,
    value: f64,
    #[serde(default)]
    workout_id: Option<String>,
}

pub async fn record(
    State(state): State<Arc<AppState>>,
    Json(attempt): Json<RecordAttempt>,
) -> (StatusCode, Json<Value>) {
    match gym::check_and_update_pr(
        &state.store,
        &attempt.exercise_id,
        &attempt.user_id,
        &attempt.record_type,
        attempt.value,
        attempt.workout_id.as_deref(),
    )
    .await
    {
        Ok(new_record) => (StatusCode::OK, Json(json!({"newRecord": new_record}))),
        Err(e) => internal("check personal record", e),
    }
}
