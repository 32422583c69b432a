use super::AppState;
use crate::chat::WorkingHours;
use crate::entity::{appointments, brands, businesses, conversations};
use crate::ops::{submission_json, validate};
use crate::store::{NewBusiness, to_rfc3339};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

type Reply = (StatusCode, Json<Value>);

fn failure(status: StatusCode, message: impl Into<String>) -> Reply {
    (status, Json(json!({"error": message.into()})))
}

fn internal(action: &str, e: anyhow::Error) -> Reply {
    error!("Failed to {}: {:#}", action, e);
    failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

fn business_json(b: &businesses::Model) -> Value {
    let working_hours =
        serde_json::from_str::<Value>(&b.working_hours).unwrap_or_else(|_| json!(b.working_hours));
    json!({
        "id": b.id,
        "businessName": b.business_name,
        "botName": b.bot_name,
        "botStyle": b.bot_style,
        "phone": b.phone,
        "timezone": b.timezone,
        "workingHours": working_hours,
        "outOfHoursMessage": b.out_of_hours_message,
        "noAnswerMessage": b.no_answer_message,
        "twilioPhoneNumber": b.twilio_phone_number,
        "evolutionInstanceId": b.evolution_instance_id,
    })
}

fn conversation_json(c: &conversations::Model) -> Value {
    json!({
        "id": c.id,
        "customerPhone": c.customer_phone,
        "customerName": c.customer_name,
        "message": c.message,
        "botResponse": c.bot_response,
        "responseType": c.response_type,
        "aiConfidence": c.ai_confidence,
        "needsFollowup": c.needs_followup,
        "createdAt": to_rfc3339(c.created_at_us),
    })
}

fn appointment_json(a: &appointments::Model) -> Value {
    json!({
        "id": a.id,
        "customerPhone": a.customer_phone,
        "customerName": a.customer_name,
        "status": a.status,
        "note": a.note,
        "createdAt": to_rfc3339(a.created_at_us),
    })
}

fn brand_json(b: &brands::Model) -> Value {
    json!({
        "id": b.id,
        "businessName": b.business_name,
        "instagramHandle": b.instagram_handle,
        "instagramAccountId": b.instagram_account_id,
        "status": b.status,
        "connected": b.instagram_access_token.is_some(),
    })
}

pub async fn create_business(
    State(state): State<Arc<AppState>>,
    Json(business): Json<NewBusiness>,
) -> Reply {
    if business.business_name.trim().is_empty() || business.bot_name.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "businessName and botName are required");
    }
    if let Err(e) = WorkingHours::parse(&business.working_hours) {
        return failure(StatusCode::BAD_REQUEST, format!("{:#}", e));
    }

    match state.store.insert_business(business).await {
        Ok(saved) => {
            info!(business_id = %saved.id, name = %saved.business_name, "Business created");
            (StatusCode::CREATED, Json(business_json(&saved)))
        }
        Err(e) => internal("create business", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKnowledge {
    question: String,
    answer: String,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn add_knowledge(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    Json(entry): Json<NewKnowledge>,
) -> Reply {
    match state.store.business_by_id(&business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Business not found"),
        Err(e) => return internal("load business", e),
    }

    match state
        .store
        .insert_knowledge(
            &business_id,
            &entry.question,
            &entry.answer,
            entry.priority,
            entry.is_active,
        )
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(json!({"id": id}))),
        Err(e) => internal("add knowledge", e),
    }
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Reply {
    match state.store.list_conversations(&business_id).await {
        Ok(rows) => {
            let conversations: Vec<Value> = rows.iter().map(conversation_json).collect();
            (StatusCode::OK, Json(json!({"conversations": conversations})))
        }
        Err(e) => internal("list conversations", e),
    }
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Reply {
    match state.store.list_appointments(&business_id).await {
        Ok(rows) => {
            let appointments: Vec<Value> = rows.iter().map(appointment_json).collect();
            (StatusCode::OK, Json(json!({"appointments": appointments})))
        }
        Err(e) => internal("list appointments", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBrand {
    business_name: String,
    instagram_handle: String,
    #[serde(default)]
    instagram_account_id: Option<String>,
}

pub async fn create_brand(
    State(state): State<Arc<AppState>>,
    Json(brand): Json<NewBrand>,
) -> Reply {
    if brand.business_name.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "businessName is required");
    }
    let handle = match validate::handle(Some(brand.instagram_handle.as_str()), "Instagram handle") {
        Ok(handle) => handle,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state
        .store
        .insert_brand(
            brand.business_name.trim(),
            handle,
            brand.instagram_account_id.as_deref(),
        )
        .await
    {
        Ok(saved) => {
            info!(brand_id = %saved.id, handle = %saved.instagram_handle, "Brand created");
            (StatusCode::CREATED, Json(brand_json(&saved)))
        }
        Err(e) => internal("create brand", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    username: String,
    #[serde(default)]
    instagram_followers: Option<i64>,
}

/// A customer claims to have posted a story tagging the brand.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Path(brand_id): Path<String>,
    Json(submission): Json<NewSubmission>,
) -> Reply {
    let username = match validate::handle(Some(submission.username.as_str()), "Username") {
        Ok(username) => username,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let brand = match state.store.brand_by_id(&brand_id).await {
        Ok(Some(brand)) => brand,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Brand not found"),
        Err(e) => return internal("load brand", e),
    };

    match state
        .store
        .insert_submission(&brand.id, username, submission.instagram_followers, Utc::now())
        .await
    {
        Ok(saved) => {
            info!(submission_id = %saved.id, username = %saved.username, "Submission received");
            (StatusCode::CREATED, Json(submission_json(&saved)))
        }
        Err(e) => internal("create submission", e),
    }
}
