use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workouts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub workout_name: String,
    pub workout_date_us: i64,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
