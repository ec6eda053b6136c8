use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Mutex, MutexGuard };
use std::time::Duration;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use uuid::Uuid;

use crate::db::entity::payment_confirmation;
use crate::db::{ ConfirmationStore, RestrictionState };
use crate::enums::ConfirmationStatus;
use crate::error::{ AppError, Result };

#[derive(Default)]
struct Inner {
    confirmations: HashMap<Uuid, payment_confirmation::Model>,
    restrictions: HashMap<String, (bool, DateTime<Utc>)>,
    // (transaction_id, added_at), at most one entry per transaction
    reasons: HashMap<String, Vec<(Uuid, DateTime<Utc>)>>,
}

/// In-process store for local runs (`DATABASE_URL=memory://`) and tests.
///
/// Each trait call takes the lock once, so every operation is atomic in the
/// same way the conditional SQL statements are.
#[derive(Default)]
pub struct MemoryConfirmationStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryConfirmationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    async fn enter(&self) -> Result<MutexGuard<'_, Inner>> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("confirmation store is unavailable".to_string()));
        }

        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl ConfirmationStore for MemoryConfirmationStore {
    async fn insert_confirmation(
        &self,
        confirmation: payment_confirmation::Model
    ) -> Result<payment_confirmation::Model> {
        let mut inner = self.enter().await?;

        if inner.confirmations.contains_key(&confirmation.transaction_id) {
            return Err(
                AppError::InvalidInput(
                    format!(
                        "Payment confirmation for transaction {} already exists",
                        confirmation.transaction_id
                    )
                )
            );
        }

        inner.confirmations.insert(confirmation.transaction_id, confirmation.clone());
        Ok(confirmation)
    }

    async fn find_confirmation(
        &self,
        transaction_id: Uuid
    ) -> Result<Option<payment_confirmation::Model>> {
        let inner = self.enter().await?;
        Ok(inner.confirmations.get(&transaction_id).cloned())
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<payment_confirmation::Model>> {
        let inner = self.enter().await?;

        let mut overdue: Vec<_> = inner.confirmations
            .values()
            .filter(|c| c.status() == ConfirmationStatus::Pending && c.deadline <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|c| c.deadline);

        Ok(overdue)
    }

    async fn find_outstanding_for_seller(
        &self,
        seller_id: &str
    ) -> Result<Vec<payment_confirmation::Model>> {
        let inner = self.enter().await?;

        let mut outstanding: Vec<_> = inner.confirmations
            .values()
            .filter(|c| c.seller_id == seller_id && c.status().is_outstanding())
            .cloned()
            .collect();
        outstanding.sort_by_key(|c| c.deadline);

        Ok(outstanding)
    }

    async fn expire_and_restrict(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool> {
        let mut inner = self.enter().await?;

        match inner.confirmations.get_mut(&transaction_id) {
            Some(c) if
                c.seller_id == seller_id &&
                c.status() == ConfirmationStatus::Pending &&
                c.deadline <= now
            => {
                c.status = ConfirmationStatus::Expired.to_string();
                c.expired_at = Some(now);
                c.updated_at = now;
            }
            _ => {
                return Ok(false);
            }
        }

        inner.restrictions.insert(seller_id.to_string(), (true, now));
        let reasons = inner.reasons.entry(seller_id.to_string()).or_default();
        if !reasons.iter().any(|(id, _)| *id == transaction_id) {
            reasons.push((transaction_id, now));
        }

        Ok(true)
    }

    async fn mark_confirmed(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<Option<payment_confirmation::Model>> {
        let mut inner = self.enter().await?;

        match inner.confirmations.get_mut(&transaction_id) {
            Some(c) if !c.is_confirmed() => {
                c.status = ConfirmationStatus::Confirmed.to_string();
                c.confirmed_at = Some(now);
                c.updated_at = now;
                Ok(Some(c.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn remove_restriction_reason(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool> {
        let mut inner = self.enter().await?;

        if !inner.restrictions.contains_key(seller_id) {
            return Ok(false);
        }

        let still_active = match inner.reasons.get_mut(seller_id) {
            Some(reasons) => {
                reasons.retain(|(id, _)| *id != transaction_id);
                !reasons.is_empty()
            }
            None => false,
        };

        inner.restrictions.insert(seller_id.to_string(), (still_active, now));
        Ok(still_active)
    }

    async fn find_restriction(&self, seller_id: &str) -> Result<Option<RestrictionState>> {
        let inner = self.enter().await?;

        let Some(&(active, updated_at)) = inner.restrictions.get(seller_id) else {
            return Ok(None);
        };

        let mut reasons = inner.reasons.get(seller_id).cloned().unwrap_or_default();
        reasons.sort_by_key(|&(id, added_at)| (added_at, id));
        let reasons = reasons
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        Ok(
            Some(RestrictionState {
                seller_id: seller_id.to_string(),
                active,
                reasons,
                updated_at: Some(updated_at),
            })
        )
    }
}
