use sea_orm::entity::prelude::*;

/// `line_items` is the frozen checkout snapshot and is never rewritten after insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub line_items: Json,
    pub total_amount: i64,
    pub delivery_fee: i64,
    pub delivery_latitude: f64,
    pub delivery_longitude: f64,
    pub delivery_notes: Option<String>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
