use super::AppState;
use crate::chat::{Channel, InboundMessage};
use crate::utils::normalize_phone;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "ProfileName")]
    pub profile_name: Option<String>,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

impl TwilioForm {
    pub fn into_inbound(self) -> InboundMessage {
        InboundMessage {
            channel: Channel::Twilio,
            customer_phone: normalize_phone(&self.from),
            business_key: normalize_phone(&self.to),
            customer_name: self.profile_name.filter(|n| !n.is_empty()),
            body: self.body,
        }
    }
}

fn twiml() -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
}

/// Always acknowledges with empty TwiML so Twilio does not retry.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!("Unreadable Twilio webhook: {}", rejection);
            return twiml();
        }
    };
    info!(message_sid = ?form.message_sid, "Twilio webhook received");
    match state.pipeline.handle(form.into_inbound(), Utc::now()).await {
        Ok(outcome) => info!(outcome = ?outcome, "Twilio message handled"),
        Err(e) => error!("Error processing Twilio message: {:#}", e),
    }
    twiml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::tests::test_state;

    #[test]
    fn form_fields_are_normalised() {
        let form: TwilioForm = serde_json::from_value(serde_json::json!({
            "From": "whatsapp:+972501234567",
            "To": "whatsapp:+14155238886",
            "Body": "Hi",
            "ProfileName": "Noa",
            "MessageSid": "SM1"
        }))
        .unwrap();
        let inbound = form.into_inbound();
        assert_eq!(inbound.customer_phone, "972501234567");
        assert_eq!(inbound.business_key, "14155238886");
        assert_eq!(inbound.customer_name.as_deref(), Some("Noa"));
        assert_eq!(inbound.body, "Hi");
    }

    #[tokio::test]
    async fn empty_body_gets_empty_twiml_without_side_effects() {
        let (_dir, state, responder, messenger) = test_state().await;
        let form = TwilioForm {
            from: "whatsapp:+972501234567".to_string(),
            to: "whatsapp:+14155238886".to_string(),
            ..Default::default()
        };

        let response = receive(State(state), Ok(Form(form))).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, EMPTY_TWIML.as_bytes());
        assert_eq!(responder.calls(), 0);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_number_still_acknowledges() {
        let (_dir, state, _responder, _messenger) = test_state().await;
        let form = TwilioForm {
            from: "whatsapp:+972501234567".to_string(),
            to: "whatsapp:+10000000000".to_string(),
            body: "Hello".to_string(),
            ..Default::default()
        };
        let response = receive(State(state), Ok(Form(form))).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn unreadable_body_still_gets_empty_twiml() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let (_dir, state, responder, _messenger) = test_state().await;
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"From":"whatsapp:+972501234567"}"#))
            .unwrap();
        let rejected = Form::<TwilioForm>::from_request(request, &()).await;
        assert!(rejected.is_err());

        let response = receive(State(state), rejected).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, EMPTY_TWIML.as_bytes());
        assert_eq!(responder.calls(), 0);
    }
}
