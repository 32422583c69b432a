use super::{Store, new_id};
use crate::entity::{appointments, businesses, conversations, knowledge_base};
use anyhow::Result;
use sea_orm::*;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
    pub business_name: String,
    pub bot_name: String,
    #[serde(default = "default_bot_style")]
    pub bot_style: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_working_hours")]
    pub working_hours: String,
    #[serde(default)]
    pub out_of_hours_message: String,
    #[serde(default)]
    pub no_answer_message: String,
    #[serde(default)]
    pub twilio_phone_number: Option<String>,
    #[serde(default)]
    pub evolution_instance_id: Option<String>,
    #[serde(default)]
    pub evolution_instance_token: Option<String>,
}

fn default_bot_style() -> String {
    "friendly".to_string()
}

fn default_timezone() -> String {
    "Asia/Jerusalem".to_string()
}

fn default_working_hours() -> String {
    "{}".to_string()
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub business_id: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub message: String,
    pub bot_response: String,
    pub response_type: String,
    pub ai_confidence: f64,
    pub matched_knowledge_id: Option<String>,
}

impl Store {
    pub async fn insert_business(&self, business: NewBusiness) -> Result<businesses::Model> {
        self.run(move |db| {
            let record = businesses::ActiveModel {
                id: Set(new_id()),
                business_name: Set(business.business_name),
                bot_name: Set(business.bot_name),
                bot_style: Set(business.bot_style),
                phone: Set(business.phone),
                timezone: Set(business.timezone),
                working_hours: Set(business.working_hours),
                out_of_hours_message: Set(business.out_of_hours_message),
                no_answer_message: Set(business.no_answer_message),
                twilio_phone_number: Set(business.twilio_phone_number),
                evolution_instance_id: Set(business.evolution_instance_id),
                evolution_instance_token: Set(business.evolution_instance_token),
            };
            Ok(record.insert(db)?)
        })
        .await
    }

    pub async fn business_by_id(&self, id: &str) -> Result<Option<businesses::Model>> {
        let id = id.to_string();
        self.run(move |db| Ok(businesses::Entity::find_by_id(id).one(db)?))
            .await
    }

    pub async fn business_by_twilio_number(
        &self,
        number: &str,
    ) -> Result<Option<businesses::Model>> {
        let number = number.to_string();
        self.run(move |db| {
            Ok(businesses::Entity::find()
                .filter(businesses::Column::TwilioPhoneNumber.eq(number))
                .one(db)?)
        })
        .await
    }

    pub async fn business_by_evolution_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<businesses::Model>> {
        let instance_id = instance_id.to_string();
        self.run(move |db| {
            Ok(businesses::Entity::find()
                .filter(businesses::Column::EvolutionInstanceId.eq(instance_id))
                .one(db)?)
        })
        .await
    }

    pub async fn insert_knowledge(
        &self,
        business_id: &str,
        question: &str,
        answer: &str,
        priority: i32,
        is_active: bool,
    ) -> Result<String> {
        let record = knowledge_base::ActiveModel {
            id: Set(new_id()),
            business_id: Set(business_id.to_string()),
            question: Set(question.to_string()),
            answer: Set(answer.to_string()),
            priority: Set(priority),
            is_active: Set(is_active),
        };
        self.run(move |db| {
            let model = record.insert(db)?;
            Ok(model.id)
        })
        .await
    }

    /// Active entries of a business, highest priority first.
    pub async fn active_knowledge(&self, business_id: &str) -> Result<Vec<knowledge_base::Model>> {
        let business_id = business_id.to_string();
        self.run(move |db| {
            Ok(knowledge_base::Entity::find()
                .filter(knowledge_base::Column::BusinessId.eq(business_id))
                .filter(knowledge_base::Column::IsActive.eq(true))
                .order_by_desc(knowledge_base::Column::Priority)
                .all(db)?)
        })
        .await
    }

    pub async fn insert_conversation(&self, conversation: NewConversation) -> Result<String> {
        let now = chrono::Utc::now().timestamp_micros();
        let needs_followup = conversation.response_type == "no_answer";
        let record = conversations::ActiveModel {
            id: Set(new_id()),
            business_id: Set(conversation.business_id),
            customer_phone: Set(conversation.customer_phone),
            customer_name: Set(conversation.customer_name),
            message: Set(conversation.message),
            bot_response: Set(conversation.bot_response),
            response_type: Set(conversation.response_type),
            ai_confidence: Set(conversation.ai_confidence),
            needs_followup: Set(needs_followup),
            matched_knowledge_id: Set(conversation.matched_knowledge_id),
            created_at_us: Set(now),
        };
        self.run(move |db| {
            let model = record.insert(db)?;
            Ok(model.id)
        })
        .await
    }

    pub async fn list_conversations(&self, business_id: &str) -> Result<Vec<conversations::Model>> {
        let business_id = business_id.to_string();
        self.run(move |db| {
            Ok(conversations::Entity::find()
                .filter(conversations::Column::BusinessId.eq(business_id))
                .order_by_asc(conversations::Column::CreatedAtUs)
                .all(db)?)
        })
        .await
    }

    pub async fn insert_appointment(
        &self,
        business_id: &str,
        customer_phone: &str,
        customer_name: Option<&str>,
        note: &str,
    ) -> Result<String> {
        let record = appointments::ActiveModel {
            id: Set(new_id()),
            business_id: Set(business_id.to_string()),
            customer_phone: Set(customer_phone.to_string()),
            customer_name: Set(customer_name.map(String::from)),
            status: Set("requested".to_string()),
            note: Set(note.to_string()),
            created_at_us: Set(chrono::Utc::now().timestamp_micros()),
        };
        self.run(move |db| {
            let model = record.insert(db)?;
            Ok(model.id)
        })
        .await
    }

    pub async fn list_appointments(&self, business_id: &str) -> Result<Vec<appointments::Model>> {
        let business_id = business_id.to_string();
        self.run(move |db| {
            Ok(appointments::Entity::find()
                .filter(appointments::Column::BusinessId.eq(business_id))
                .all(db)?)
        })
        .await
    }
}

#[cfg(test)]
pub(crate) fn sample_business() -> NewBusiness {
    NewBusiness {
        business_name: "Dana's Bakery".to_string(),
        bot_name: "Dana Bot".to_string(),
        bot_style: "friendly".to_string(),
        phone: Some("035551234".to_string()),
        timezone: "Asia/Jerusalem".to_string(),
        working_hours: r#"{"sunday":{"active":true,"start":"08:00","end":"18:00"}}"#.to_string(),
        out_of_hours_message: "We are closed right now.".to_string(),
        no_answer_message: "A human will get back to you.".to_string(),
        twilio_phone_number: Some("14155238886".to_string()),
        evolution_instance_id: Some("bakery-instance".to_string()),
        evolution_instance_token: Some("instance-token".to_string()),
    }
}
