use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exercises")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub exercise_name: String,
    pub muscle_group: String,
    pub is_custom: bool,
}

impl ActiveModelBehavior for ActiveModel {}
