use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::enums::ConfirmationStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_confirmations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: Uuid,
    pub seller_id: String,
    pub buyer_id: String,
    pub seller_timezone: String,
    pub notified_at: DateTimeUtc,
    pub deadline: DateTimeUtc,
    pub status: String, // "pending", "confirmed", "expired"
    pub confirmed_at: Option<DateTimeUtc>,
    pub expired_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Parsed status. Unknown strings are treated as pending so they stay visible to the scan.
    pub fn status(&self) -> ConfirmationStatus {
        self.status.parse().unwrap_or(ConfirmationStatus::Pending)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status() == ConfirmationStatus::Confirmed
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
