use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub business_id: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub status: String,
    #[sea_orm(column_type = "Text")]
    pub note: String,
    pub created_at_us: i64,
}

impl ActiveModelBehavior for ActiveModel {}
