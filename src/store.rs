mod chatbot;
mod gym;
mod verification;

use crate::entity::{
    appointments, brands, businesses, conversations, exercises, instagram_mentions,
    knowledge_base, personal_records, sets, submissions, workout_exercises, workouts,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub use chatbot::{NewBusiness, NewConversation};
pub use gym::{NewSet, NewWorkout, NewWorkoutExercise};
pub use verification::NewMention;

#[cfg(test)]
pub(crate) use chatbot::sample_business;

/// SQLite-backed data access layer. Every call opens its own connection on the
/// blocking pool.
pub struct Store {
    db_url: String,
}

impl Store {
    pub async fn open(db_path: &Path) -> Result<Arc<Self>> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        tokio::task::spawn_blocking({
            let db_url = db_url.clone();
            move || -> Result<()> {
                let db = Database::connect(&db_url)?;

                db.get_schema_builder()
                    .register(businesses::Entity)
                    .register(knowledge_base::Entity)
                    .register(conversations::Entity)
                    .register(appointments::Entity)
                    .register(brands::Entity)
                    .register(submissions::Entity)
                    .register(instagram_mentions::Entity)
                    .register(workouts::Entity)
                    .register(exercises::Entity)
                    .register(workout_exercises::Entity)
                    .register(sets::Entity)
                    .register(personal_records::Entity)
                    .apply(&db)?;

                Ok(())
            }
        })
        .await??;

        info!("Store ready at {}", db_path.display());
        Ok(Arc::new(Self { db_url }))
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DatabaseConnection) -> Result<T> + Send + 'static,
    {
        let db_url = self.db_url.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let db = Database::connect(&db_url)?;
            f(&db)
        })
        .await
        .context("Store task panicked")?
    }

    pub async fn health_check(&self) -> Result<()> {
        self.run(|db| {
            brands::Entity::find().limit(1).all(db)?;
            Ok(())
        })
        .await
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn to_rfc3339(micros: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_micros(micros).map(|t| t.to_rfc3339())
}

#[cfg(test)]
pub(crate) async fn test_store() -> (tempfile::TempDir, Arc<Store>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("test.db")).await.unwrap();
    (dir, store)
}
