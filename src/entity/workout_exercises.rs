use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workout_exercises")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workout_id: String,
    pub exercise_id: String,
    pub exercise_order: i32,
    pub created_at_us: i64,
}

impl ActiveModelBehavior for ActiveModel {}
