use super::AppState;
use crate::instagram::WebhookPayload;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct Subscription {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Echoes the challenge when the subscription request carries our token.
pub fn verify_subscription(query: &Subscription, expected: Option<&str>) -> Option<String> {
    let expected = expected?;
    if query.mode.as_deref() == Some("subscribe") && query.verify_token.as_deref() == Some(expected) {
        Some(query.challenge.clone().unwrap_or_default())
    } else {
        None
    }
}

pub async fn verify(State(state): State<Arc<AppState>>, Query(query): Query<Subscription>) -> Response {
    match verify_subscription(&query, state.verify_token.as_deref()) {
        Some(challenge) => {
            info!("Instagram webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("Instagram webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Always answers 200 so the platform does not retry deliveries.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(mentions) = state.mentions.as_ref() else {
        warn!("Instagram webhook received but Instagram is not configured");
        return (
            StatusCode::OK,
            Json(json!({"success": false, "error": "Instagram is not configured"})),
        );
    };

    let result = match serde_json::from_value::<WebhookPayload>(body) {
        Ok(payload) => mentions.process(&payload).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Webhook processed"})),
        ),
        Err(e) => {
            error!("Error processing Instagram webhook: {:#}", e);
            (
                StatusCode::OK,
                Json(json!({"success": false, "error": format!("{:#}", e)})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub business_id: String,
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(oauth) = state.oauth.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Instagram OAuth is not configured"})),
        );
    };

    match oauth.connect(&request.code, &request.business_id).await {
        Ok(connected) => {
            let mut body = json!({"success": true});
            if let (Value::Object(map), Ok(Value::Object(details))) =
                (&mut body, serde_json::to_value(&connected))
            {
                map.extend(details);
            }
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!(business_id = %request.business_id, "Instagram OAuth failed: {:#}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("{:#}", e)})),
            )
        }
    }
}
