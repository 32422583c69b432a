use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "businesses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_name: String,
    pub bot_name: String,
    pub bot_style: String,
    pub phone: Option<String>,
    pub timezone: String,
    #[sea_orm(column_type = "Text")]
    pub working_hours: String,
    pub out_of_hours_message: String,
    pub no_answer_message: String,
    pub twilio_phone_number: Option<String>,
    pub evolution_instance_id: Option<String>,
    pub evolution_instance_token: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
