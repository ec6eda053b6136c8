use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_restrictions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub seller_id: String,
    pub active: bool,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::restriction_reason::Entity")]
    RestrictionReason,
}

impl Related<super::restriction_reason::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RestrictionReason.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
