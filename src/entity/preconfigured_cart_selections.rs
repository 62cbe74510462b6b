use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "preconfigured_cart_selections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub preconfigured_cart_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::preconfigured_carts::Entity",
        from = "Column::PreconfiguredCartId",
        to = "super::preconfigured_carts::Column::Id"
    )]
    PreconfiguredCart,
}

impl Related<super::preconfigured_carts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PreconfiguredCart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
