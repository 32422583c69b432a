use super::hours::WorkingHours;
use super::messenger::Messenger;
use super::prompt::build_prompt;
use super::reply::{ResponseType, classify_reply};
use crate::entity::businesses;
use crate::llm::Responder;
use crate::store::{NewConversation, Store};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Twilio,
    Evolution,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: Channel,
    pub customer_phone: String,
    /// Twilio receiving number or Evolution instance id.
    pub business_key: String,
    pub customer_name: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ignored,
    UnknownBusiness,
    OutOfHours,
    Replied {
        response_type: ResponseType,
        confidence: f64,
    },
}

pub struct Pipeline {
    store: Arc<Store>,
    responder: Arc<dyn Responder>,
    twilio: Option<Arc<dyn Messenger>>,
    evolution: Option<Arc<dyn Messenger>>,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        responder: Arc<dyn Responder>,
        twilio: Option<Arc<dyn Messenger>>,
        evolution: Option<Arc<dyn Messenger>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            responder,
            twilio,
            evolution,
        })
    }

    fn messenger(&self, channel: Channel) -> Result<&Arc<dyn Messenger>> {
        let messenger = match channel {
            Channel::Twilio => self.twilio.as_ref(),
            Channel::Evolution => self.evolution.as_ref(),
        };
        messenger.ok_or_else(|| anyhow!("No messenger configured for {:?}", channel))
    }

    async fn find_business(&self, inbound: &InboundMessage) -> Result<Option<businesses::Model>> {
        match inbound.channel {
            Channel::Twilio => self.store.business_by_twilio_number(&inbound.business_key).await,
            Channel::Evolution => {
                self.store
                    .business_by_evolution_instance(&inbound.business_key)
                    .await
            }
        }
    }

    pub async fn handle(&self, inbound: InboundMessage, now: DateTime<Utc>) -> Result<Outcome> {
        if inbound.customer_phone.trim().is_empty() || inbound.body.trim().is_empty() {
            info!("Missing phone or message, ignoring");
            return Ok(Outcome::Ignored);
        }

        info!(
            channel = ?inbound.channel,
            customer = %inbound.customer_phone,
            "Processing inbound message"
        );

        let Some(business) = self.find_business(&inbound).await? else {
            warn!(key = %inbound.business_key, "Business not found");
            return Ok(Outcome::UnknownBusiness);
        };

        let hours = WorkingHours::parse(&business.working_hours).unwrap_or_else(|e| {
            warn!(business_id = %business.id, "{:#}", e);
            WorkingHours::default()
        });
        let messenger = self.messenger(inbound.channel)?;

        if !hours.is_open(&business.timezone, now) {
            messenger
                .send_text(
                    &business,
                    &inbound.customer_phone,
                    &business.out_of_hours_message,
                )
                .await
                .context("Failed to send out-of-hours message")?;
            self.record(
                &business,
                &inbound,
                &business.out_of_hours_message,
                ResponseType::OutOfHours,
                1.0,
            )
            .await?;
            info!(business_id = %business.id, "Replied out of hours");
            return Ok(Outcome::OutOfHours);
        }

        let knowledge = match self.store.active_knowledge(&business.id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(business_id = %business.id, "Knowledge base unavailable: {:#}", e);
                Vec::new()
            }
        };

        let prompt = build_prompt(&business, &knowledge, &hours, &inbound.body);
        let raw = self
            .responder
            .complete(&prompt)
            .await
            .context("Completion request failed")?;
        let reply = classify_reply(&raw, &business);

        messenger
            .send_text(&business, &inbound.customer_phone, &reply.text)
            .await
            .context("Failed to send reply")?;
        self.record(
            &business,
            &inbound,
            &reply.text,
            reply.response_type,
            reply.confidence,
        )
        .await?;

        if reply.response_type == ResponseType::Scheduling {
            self.store
                .insert_appointment(
                    &business.id,
                    &inbound.customer_phone,
                    inbound.customer_name.as_deref(),
                    &inbound.body,
                )
                .await?;
        }

        info!(
            response_type = %reply.response_type,
            confidence = reply.confidence,
            "Response sent"
        );
        Ok(Outcome::Replied {
            response_type: reply.response_type,
            confidence: reply.confidence,
        })
    }

    async fn record(
        &self,
        business: &businesses::Model,
        inbound: &InboundMessage,
        bot_response: &str,
        response_type: ResponseType,
        confidence: f64,
    ) -> Result<()> {
        self.store
            .insert_conversation(NewConversation {
                business_id: business.id.clone(),
                customer_phone: inbound.customer_phone.clone(),
                customer_name: inbound.customer_name.clone(),
                message: inbound.body.clone(),
                bot_response: bot_response.to_string(),
                response_type: response_type.to_string(),
                ai_confidence: confidence,
                matched_knowledge_id: None,
            })
            .await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::{FakeMessenger, FakeResponder};
    use super::*;
    use crate::store::{sample_business, test_store};
    use chrono::TimeZone;

    // 2024-01-07 is a Sunday; 10:00 UTC is 12:00 in Jerusalem.
    fn sunday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 7, 10, 0, 0).unwrap()
    }

    // 2024-01-08 is a Monday, which has no entry in the sample hours.
    fn monday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap()
    }

    fn twilio_message(body: &str) -> InboundMessage {
        InboundMessage {
            channel: Channel::Twilio,
            customer_phone: "972501234567".to_string(),
            business_key: "14155238886".to_string(),
            customer_name: Some("Noa".to_string()),
            body: body.to_string(),
        }
    }

    async fn setup(
        reply: &str,
    ) -> (
        tempfile::TempDir,
        Arc<Store>,
        Arc<FakeResponder>,
        Arc<FakeMessenger>,
        Arc<Pipeline>,
    ) {
        let (dir, store) = test_store().await;
        let responder = FakeResponder::replying(reply);
        let messenger = Arc::new(FakeMessenger::default());
        let pipeline = Pipeline::new(
            store.clone(),
            responder.clone(),
            Some(messenger.clone()),
            Some(messenger.clone()),
        );
        (dir, store, responder, messenger, pipeline)
    }

    #[tokio::test]
    async fn empty_body_is_ignored_without_side_effects() {
        let (_dir, store, responder, messenger, pipeline) = setup("hello").await;
        let business = store.insert_business(sample_business()).await.unwrap();

        let outcome = pipeline.handle(twilio_message("   "), sunday_noon()).await.unwrap();

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(responder.calls(), 0);
        assert!(messenger.sent().is_empty());
        assert!(store.list_conversations(&business.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_hours_sends_fixed_message_and_records_it() {
        let (_dir, store, responder, messenger, pipeline) = setup("hello").await;
        let business = store.insert_business(sample_business()).await.unwrap();

        let outcome = pipeline
            .handle(twilio_message("Are you open?"), monday_noon())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::OutOfHours);
        assert_eq!(responder.calls(), 0);
        assert_eq!(
            messenger.sent(),
            vec![("972501234567".to_string(), "We are closed right now.".to_string())]
        );
        let rows = store.list_conversations(&business.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_type, "out_of_hours");
        assert_eq!(rows[0].ai_confidence, 1.0);
        assert!(!rows[0].needs_followup);
    }

    #[tokio::test]
    async fn unknown_business_is_reported() {
        let (_dir, _store, responder, _messenger, pipeline) = setup("hello").await;
        let outcome = pipeline.handle(twilio_message("hi"), sunday_noon()).await.unwrap();
        assert_eq!(outcome, Outcome::UnknownBusiness);
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn answered_reply_is_sent_and_recorded() {
        let (_dir, store, responder, messenger, pipeline) = setup("We bake sourdough daily").await;
        let business = store.insert_business(sample_business()).await.unwrap();
        store
            .insert_knowledge(&business.id, "Bread?", "Sourdough every day", 1, true)
            .await
            .unwrap();

        let outcome = pipeline
            .handle(twilio_message("Do you have bread?"), sunday_noon())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Replied {
                response_type: ResponseType::Answered,
                confidence: 0.9
            }
        );
        assert_eq!(responder.calls(), 1);
        assert!(responder.prompts.lock().unwrap()[0].contains("Sourdough every day"));
        assert_eq!(messenger.sent()[0].1, "We bake sourdough daily");
        let rows = store.list_conversations(&business.id).await.unwrap();
        assert_eq!(rows[0].response_type, "answered");
    }

    #[tokio::test]
    async fn no_answer_flags_followup() {
        let (_dir, store, _responder, messenger, pipeline) = setup("[NO_ANSWER]").await;
        let business = store.insert_business(sample_business()).await.unwrap();

        pipeline
            .handle(twilio_message("Do you cater weddings?"), sunday_noon())
            .await
            .unwrap();

        assert_eq!(messenger.sent()[0].1, "A human will get back to you.");
        let rows = store.list_conversations(&business.id).await.unwrap();
        assert_eq!(rows[0].response_type, "no_answer");
        assert!(rows[0].needs_followup);
    }

    #[tokio::test]
    async fn scheduling_creates_an_appointment_request() {
        let (_dir, store, _responder, _messenger, pipeline) = setup("[SCHEDULE_CALL]").await;
        let business = store.insert_business(sample_business()).await.unwrap();

        let outcome = pipeline
            .handle(twilio_message("Can we talk tomorrow?"), sunday_noon())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            Outcome::Replied {
                response_type: ResponseType::Scheduling,
                ..
            }
        ));
        let appointments = store.list_appointments(&business.id).await.unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, "requested");
        assert_eq!(appointments[0].customer_name.as_deref(), Some("Noa"));
    }
}
