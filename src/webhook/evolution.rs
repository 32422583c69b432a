use super::AppState;
use crate::chat::{Channel, InboundMessage, Outcome};
use crate::utils::phone_from_jid;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

const MESSAGE_EVENT: &str = "messages.upsert";

/// Extracts an inbound message from an Evolution webhook, or `None` for events
/// that are not customer messages.
pub fn parse_event(payload: &Value) -> Option<InboundMessage> {
    let data = &payload["data"];
    if payload["event"] != MESSAGE_EVENT || data["key"]["fromMe"] == true {
        return None;
    }

    let message = &data["message"];
    let body = message["conversation"]
        .as_str()
        .filter(|text| !text.is_empty())
        .or_else(|| message["extendedTextMessage"]["text"].as_str())
        .unwrap_or_default();

    Some(InboundMessage {
        channel: Channel::Evolution,
        customer_phone: data["key"]["remoteJid"]
            .as_str()
            .map(phone_from_jid)
            .unwrap_or_default(),
        business_key: payload["instance"].as_str().unwrap_or_default().to_string(),
        customer_name: data["pushName"].as_str().map(String::from),
        body: body.to_string(),
    })
}

pub async fn receive(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            error!("Unreadable Evolution webhook: {}", rejection);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": rejection.body_text()})),
            );
        }
    };
    let Some(inbound) = parse_event(&payload) else {
        return (StatusCode::OK, Json(json!({"status": "ignored"})));
    };

    match state.pipeline.handle(inbound, Utc::now()).await {
        Ok(Outcome::Ignored) => (StatusCode::OK, Json(json!({"status": "ignored"}))),
        Ok(Outcome::UnknownBusiness) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Business not found"})),
        ),
        Ok(Outcome::OutOfHours) => (StatusCode::OK, Json(json!({"status": "out_of_hours"}))),
        Ok(Outcome::Replied {
            response_type,
            confidence,
        }) => {
            info!(response_type = %response_type, "Evolution message handled");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "responseType": response_type.as_str(),
                    "confidence": confidence,
                })),
            )
        }
        Err(e) => {
            error!("Error processing Evolution message: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("{:#}", e)})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::tests::test_state;

    fn upsert(message: Value) -> Value {
        json!({
            "event": "messages.upsert",
            "instance": "bakery-instance",
            "data": {
                "key": {"remoteJid": "972501234567@s.whatsapp.net", "fromMe": false},
                "pushName": "Noa",
                "message": message
            }
        })
    }

    #[test]
    fn text_comes_from_either_message_shape() {
        let plain = parse_event(&upsert(json!({"conversation": "Open today?"}))).unwrap();
        assert_eq!(plain.body, "Open today?");
        assert_eq!(plain.customer_phone, "972501234567");
        assert_eq!(plain.business_key, "bakery-instance");
        assert_eq!(plain.customer_name.as_deref(), Some("Noa"));

        let extended =
            parse_event(&upsert(json!({"extendedTextMessage": {"text": "Price?"}}))).unwrap();
        assert_eq!(extended.body, "Price?");

        let fallback = parse_event(&upsert(json!({
            "conversation": "",
            "extendedTextMessage": {"text": "Still open?"}
        })))
        .unwrap();
        assert_eq!(fallback.body, "Still open?");

        let image = parse_event(&upsert(json!({"imageMessage": {}}))).unwrap();
        assert!(image.body.is_empty());
    }

    #[test]
    fn own_messages_and_other_events_are_skipped() {
        let mut own = upsert(json!({"conversation": "x"}));
        own["data"]["key"]["fromMe"] = json!(true);
        assert!(parse_event(&own).is_none());

        let mut status = upsert(json!({"conversation": "x"}));
        status["event"] = json!("connection.update");
        assert!(parse_event(&status).is_none());
    }

    #[tokio::test]
    async fn responses_follow_outcome() {
        let (_dir, state, responder, _messenger) = test_state().await;

        let (status, Json(body)) =
            receive(State(state.clone()), Ok(Json(upsert(json!({"imageMessage": {}}))))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ignored"}));

        let mut unknown = upsert(json!({"conversation": "hello"}));
        unknown["instance"] = json!("nobody");
        let (status, Json(body)) = receive(State(state), Ok(Json(unknown))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Business not found");
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn unreadable_payload_is_a_server_error() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let (_dir, state, responder, _messenger) = test_state().await;
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let rejected = Json::<Value>::from_request(request, &()).await;
        assert!(rejected.is_err());

        let (status, Json(body)) = receive(State(state), rejected).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
        assert_eq!(responder.calls(), 0);
    }
}
