use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "brands")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_name: String,
    pub instagram_handle: String,
    pub location: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub instagram_account_id: Option<String>,
    pub instagram_access_token: Option<String>,
    pub instagram_username: Option<String>,
    pub token_created_at_us: Option<i64>,
    pub token_expires_at_us: Option<i64>,
}

impl ActiveModelBehavior for ActiveModel {}
