use super::{Store, new_id};
use crate::entity::{exercises, personal_records, sets, workout_exercises, workouts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    pub user_id: String,
    pub workout_name: String,
    pub workout_date: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSet {
    pub workout_exercise_id: String,
    pub set_number: i32,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<i32>,
    #[serde(default)]
    pub rpe: Option<f64>,
}

/// Links an exercise to a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkoutExercise {
    pub workout_id: String,
    pub exercise_id: String,
    #[serde(default)]
    pub exercise_order: i32,
}

impl Store {
    pub async fn create_workout(&self, workout: NewWorkout) -> Result<workouts::Model> {
        let record = workouts::ActiveModel {
            id: Set(new_id()),
            user_id: Set(workout.user_id),
            workout_name: Set(workout.workout_name),
            workout_date_us: Set(workout.workout_date.timestamp_micros()),
            duration_minutes: Set(workout.duration_minutes),
            notes: Set(workout.notes),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    /// Most recent workouts of a user, newest first.
    pub async fn recent_workouts(&self, user_id: &str, limit: u64) -> Result<Vec<workouts::Model>> {
        let user_id = user_id.to_string();
        self.run(move |db| {
            Ok(workouts::Entity::find()
                .filter(workouts::Column::UserId.eq(user_id))
                .order_by_desc(workouts::Column::WorkoutDateUs)
                .limit(limit)
                .all(db)?)
        })
        .await
    }

    pub async fn workouts_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<workouts::Model>> {
        let user_id = user_id.to_string();
        self.run(move |db| {
            Ok(workouts::Entity::find()
                .filter(workouts::Column::UserId.eq(user_id))
                .filter(workouts::Column::WorkoutDateUs.gte(since.timestamp_micros()))
                .order_by_desc(workouts::Column::WorkoutDateUs)
                .all(db)?)
        })
        .await
    }

    /// Exercises created through the API are always custom.
    pub async fn create_exercise(
        &self,
        exercise_name: &str,
        muscle_group: &str,
    ) -> Result<exercises::Model> {
        let record = exercises::ActiveModel {
            id: Set(new_id()),
            exercise_name: Set(exercise_name.to_string()),
            muscle_group: Set(muscle_group.to_string()),
            is_custom: Set(true),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    pub async fn list_exercises(&self, muscle_group: Option<&str>) -> Result<Vec<exercises::Model>> {
        let muscle_group = muscle_group.map(String::from);
        self.run(move |db| {
            let mut query = exercises::Entity::find().order_by_asc(exercises::Column::ExerciseName);
            if let Some(group) = muscle_group {
                query = query.filter(exercises::Column::MuscleGroup.eq(group));
            }
            Ok(query.all(db)?)
        })
        .await
    }

    pub async fn add_exercise_to_workout(
        &self,
        workout_id: &str,
        exercise_id: &str,
        exercise_order: i32,
    ) -> Result<workout_exercises::Model> {
        let record = workout_exercises::ActiveModel {
            id: Set(new_id()),
            workout_id: Set(workout_id.to_string()),
            exercise_id: Set(exercise_id.to_string()),
            exercise_order: Set(exercise_order),
            created_at_us: Set(Utc::now().timestamp_micros()),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    pub async fn add_set(&self, set: NewSet) -> Result<sets::Model> {
        let record = sets::ActiveModel {
            id: Set(new_id()),
            workout_exercise_id: Set(set.workout_exercise_id),
            set_number: Set(set.set_number),
            weight_kg: Set(set.weight_kg),
            reps: Set(set.reps),
            rpe: Set(set.rpe),
        };
        self.run(move |db| Ok(record.insert(db)?)).await
    }

    pub async fn personal_record(
        &self,
        exercise_id: &str,
        user_id: &str,
        record_type: &str,
    ) -> Result<Option<personal_records::Model>> {
        let (exercise_id, user_id, record_type) = (
            exercise_id.to_string(),
            user_id.to_string(),
            record_type.to_string(),
        );
        self.run(move |db| {
            Ok(personal_records::Entity::find()
                .filter(personal_records::Column::ExerciseId.eq(exercise_id))
                .filter(personal_records::Column::UserId.eq(user_id))
                .filter(personal_records::Column::RecordType.eq(record_type))
                .one(db)?)
        })
        .await
    }

    /// Writes `value` as the record, replacing `existing` when given.
    pub async fn upsert_personal_record(
        &self,
        existing: Option<personal_records::Model>,
        exercise_id: &str,
        user_id: &str,
        record_type: &str,
        value: f64,
        workout_id: Option<&str>,
    ) -> Result<personal_records::Model> {
        let now = Utc::now().timestamp_micros();
        let workout_id = workout_id.map(String::from);
        let (exercise_id, user_id, record_type) = (
            exercise_id.to_string(),
            user_id.to_string(),
            record_type.to_string(),
        );
        self.run(move |db| match existing {
            Some(model) => {
                let mut record: personal_records::ActiveModel = model.into();
                record.value = Set(value);
                record.achieved_at_us = Set(now);
                record.workout_id = Set(workout_id);
                Ok(record.update(db)?)
            }
            None => {
                let record = personal_records::ActiveModel {
                    id: Set(new_id()),
                    exercise_id: Set(exercise_id),
                    user_id: Set(user_id),
                    record_type: Set(record_type),
                    value: Set(value),
                    achieved_at_us: Set(now),
                    workout_id: Set(workout_id),
                };
                Ok(record.insert(db)?)
            }
        })
        .await
    }
}
