use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workout_exercise_id: String,
    pub set_number: i32,
    pub weight_kg: Option<f64>,
    pub reps: Option<i32>,
    pub rpe: Option<f64>,
}

impl ActiveModelBehavior for ActiveModel {}
