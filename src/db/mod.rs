use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod confirmation_repository;
pub use confirmation_repository::SeaOrmConfirmationStore;

mod memory_store;
pub use memory_store::MemoryConfirmationStore;

/// A seller's restriction together with the transactions that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestrictionState {
    pub seller_id: String,
    pub active: bool,
    pub reasons: Vec<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RestrictionState {
    pub fn inactive(seller_id: &str) -> Self {
        Self {
            seller_id: seller_id.to_string(),
            active: false,
            reasons: Vec::new(),
            updated_at: None,
        }
    }
}

/// Persistence collaborator for payment confirmations and account restrictions.
///
/// Every write is a single conditional statement (or one short transaction) so
/// overlapping scans and seller confirmations can interleave safely.
#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    /// Insert a new confirmation. Fails with `InvalidInput` if the transaction already has one.
    async fn insert_confirmation(
        &self,
        confirmation: payment_confirmation::Model
    ) -> Result<payment_confirmation::Model>;

    async fn find_confirmation(
        &self,
        transaction_id: Uuid
    ) -> Result<Option<payment_confirmation::Model>>;

    /// Pending confirmations whose deadline is at or before `now`.
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<payment_confirmation::Model>>;

    /// Pending or expired confirmations owed by a seller, earliest deadline first.
    async fn find_outstanding_for_seller(
        &self,
        seller_id: &str
    ) -> Result<Vec<payment_confirmation::Model>>;

    /// Expire an overdue pending confirmation and restrict its seller, atomically.
    ///
    /// The restriction and reason are written only when the conditional expiry
    /// applies, in the same transaction. Returns whether this call expired it.
    async fn expire_and_restrict(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool>;

    /// Move a pending or expired confirmation to `confirmed`.
    /// Returns the updated record, or `None` if it was already confirmed or does not exist.
    async fn mark_confirmed(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<Option<payment_confirmation::Model>>;

    /// Remove `transaction_id` from the seller's reason set, deactivating the
    /// restriction when the set becomes empty. Returns whether it is still active.
    async fn remove_restriction_reason(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool>;

    /// Reasons come back oldest first, ties ordered by transaction id.
    async fn find_restriction(&self, seller_id: &str) -> Result<Option<RestrictionState>>;
}

/// Run a store operation under `timeout`, mapping expiry to `AppError::Timeout`.
pub async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
    where F: Future<Output = Result<T>>
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!("{} exceeded {:?}", operation, timeout))),
    }
}
