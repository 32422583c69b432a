use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "instagram_mentions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_id: Option<String>,
    pub submission_id: Option<String>,
    pub media_id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub views_count: i64,
    pub story_url: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub raw_webhook_data: String,
    pub processed: bool,
    pub created_at_us: i64,
}

impl ActiveModelBehavior for ActiveModel {}
