use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "personal_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub exercise_id: String,
    pub user_id: String,
    pub record_type: String,
    pub value: f64,
    pub achieved_at_us: i64,
    pub workout_id: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
