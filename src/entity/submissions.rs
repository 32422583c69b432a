use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_id: String,
    pub username: String,
    pub status: String,
    pub story_url: Option<String>,
    pub views_count: i64,
    pub ai_confidence: i32,
    pub instagram_followers: Option<i64>,
    pub created_at_us: i64,
    pub verified_at_us: Option<i64>,
    pub last_checked_us: Option<i64>,
}

impl ActiveModelBehavior for ActiveModel {}
