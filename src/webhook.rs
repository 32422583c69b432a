mod admin;
mod evolution;
mod gym;
mod instagram;
mod twilio;

use crate::chat::Pipeline;
use crate::gym::Outbox;
use crate::instagram::{MentionHandler, OAuthFlow};
use crate::store::Store;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub struct AppState {
    pub store: Arc<Store>,
    pub pipeline: Arc<Pipeline>,
    pub mentions: Option<MentionHandler>,
    pub oauth: Option<OAuthFlow>,
    pub verify_token: Option<String>,
    pub outbox: Arc<Outbox>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/twilio", post(twilio::receive))
        .route("/webhooks/evolution", post(evolution::receive))
        .route(
            "/webhooks/instagram",
            get(instagram::verify).post(instagram::receive),
        )
        .route("/oauth/instagram", post(instagram::connect))
        .route("/businesses", post(admin::create_business))
        .route("/businesses/{id}/knowledge", post(admin::add_knowledge))
        .route("/businesses/{id}/conversations", get(admin::list_conversations))
        .route("/businesses/{id}/appointments", get(admin::list_appointments))
        .route("/brands", post(admin::create_brand))
        .route("/brands/{id}/submissions", post(admin::create_submission))
        .route("/gym/workouts", post(gym::create_workout))
        .route("/gym/workouts/{id}/exercises", post(gym::add_exercise))
        .route("/gym/sets", post(gym::add_set))
        .route(
            "/gym/exercises",
            get(gym::list_exercises).post(gym::create_exercise),
        )
        .route("/gym/records", post(gym::record))
        .route("/gym/users/{id}/dashboard", get(gym::dashboard))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "queued": state.outbox.len().await,
                "lastSync": state.outbox.last_sync().await,
            })),
        ),
        Err(e) => {
            error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "error", "error": format!("{:#}", e)})),
            )
        }
    }
}

pub async fn serve<F>(bind: &str, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("HTTP server listening on http://{}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}
