use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_id: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    #[sea_orm(column_type = "Text")]
    pub bot_response: String,
    pub response_type: String,
    pub ai_confidence: f64,
    pub needs_followup: bool,
    pub matched_knowledge_id: Option<String>,
    pub created_at_us: i64,
}

impl ActiveModelBehavior for ActiveModel {}
