use crate::store::Store;
use anyhow::Result;
use tracing::info;

/// Records `value` when it beats the current record of this type, or when
/// there is none yet. Returns whether a new record was set.
pub async fn check_and_update_pr(
    store: &Store,
    exercise_id: &str,
    user_id: &str,
    record_type: &str,
    value: f64,
    workout_id: Option<&str>,
) -> Result<bool> {
    let existing = store
        .personal_record(exercise_id, user_id, record_type)
        .await?;
    if existing.as_ref().is_some_and(|pr| value <= pr.value) {
        return Ok(false);
    }

    store
        .upsert_personal_record(existing, exercise_id, user_id, record_type, value, workout_id)
        .await?;
    info!(exercise_id, user_id, record_type, value, "New personal record");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;

    #[tokio::test]
    async fn only_strictly_larger_values_replace_a_record() {
        let (_dir, store) = test_store().await;

        assert!(check_and_update_pr(&store, "bench", "u1", "max_weight", 80.0, None).await.unwrap());
        assert!(!check_and_update_pr(&store, "bench", "u1", "max_weight", 80.0, None).await.unwrap());
        assert!(!check_and_update_pr(&store, "bench", "u1", "max_weight", 75.0, None).await.unwrap());
        assert!(
            check_and_update_pr(&store, "bench", "u1", "max_weight", 82.5, Some("w1"))
                .await
                .unwrap()
        );

        let record = store
            .personal_record("bench", "u1", "max_weight")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.value, 82.5);
        assert_eq!(record.workout_id.as_deref(), Some("w1"));

        assert!(check_and_update_pr(&store, "bench", "u1", "max_reps", 12.0, None).await.unwrap());
    }
}
