use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// One unconfirmed, expired transaction holding a seller's restriction in place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restriction_reasons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub seller_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account_restriction::Entity",
        from = "Column::SellerId",
        to = "super::account_restriction::Column::SellerId"
    )]
    AccountRestriction,
}

impl Related<super::account_restriction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountRestriction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
