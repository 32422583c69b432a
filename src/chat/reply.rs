use super::prompt::{NO_ANSWER_MARKER, SCHEDULE_MARKER};
use crate::entity::businesses;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Answered,
    NoAnswer,
    Scheduling,
    OutOfHours,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::NoAnswer => "no_answer",
            Self::Scheduling => "scheduling",
            Self::OutOfHours => "out_of_hours",
        }
    }

    pub fn needs_followup(&self) -> bool {
        matches!(self, Self::NoAnswer)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response_type: ResponseType,
    pub confidence: f64,
    pub text: String,
}

pub fn scheduling_message(business: &businesses::Model) -> String {
    format!(
        "Great! 📅 I'd love to set up a call with you. When suits you?\n\nYou can also call us directly: {}",
        business.phone.as_deref().unwrap_or_default()
    )
}

/// Maps the raw model output onto the reply that is actually sent.
pub fn classify_reply(raw: &str, business: &businesses::Model) -> Reply {
    if raw.contains(NO_ANSWER_MARKER) {
        Reply {
            response_type: ResponseType::NoAnswer,
            confidence: 0.0,
            text: business.no_answer_message.clone(),
        }
    } else if raw.contains(SCHEDULE_MARKER) {
        Reply {
            response_type: ResponseType::Scheduling,
            confidence: 1.0,
            text: scheduling_message(business),
        }
    } else {
        Reply {
            response_type: ResponseType::Answered,
            confidence: 0.9,
            text: raw.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business() -> businesses::Model {
        businesses::Model {
            id: "b1".to_string(),
            business_name: "Dana's Bakery".to_string(),
            bot_name: "Dana Bot".to_string(),
            bot_style: "friendly".to_string(),
            phone: Some("035551234".to_string()),
            timezone: "Asia/Jerusalem".to_string(),
            working_hours: "{}".to_string(),
            out_of_hours_message: "Closed".to_string(),
            no_answer_message: "A human will reply soon".to_string(),
            twilio_phone_number: None,
            evolution_instance_id: None,
            evolution_instance_token: None,
        }
    }

    #[test]
    fn no_answer_marker_uses_business_fallback() {
        let reply = classify_reply("[NO_ANSWER]", &business());
        assert_eq!(reply.response_type, ResponseType::NoAnswer);
        assert_eq!(reply.confidence, 0.0);
        assert_eq!(reply.text, "A human will reply soon");
        assert!(reply.response_type.needs_followup());
    }

    #[test]
    fn schedule_marker_invites_a_call_with_phone() {
        let reply = classify_reply("Sure [SCHEDULE_CALL]", &business());
        assert_eq!(reply.response_type, ResponseType::Scheduling);
        assert_eq!(reply.confidence, 1.0);
        assert!(reply.text.ends_with("035551234"));
        assert!(!reply.response_type.needs_followup());
    }

    #[test]
    fn plain_text_is_an_answer() {
        let reply = classify_reply(" We open at 8 🙂 \n", &business());
        assert_eq!(reply.response_type, ResponseType::Answered);
        assert_eq!(reply.confidence, 0.9);
        assert_eq!(reply.text, "We open at 8 🙂");
    }
}
