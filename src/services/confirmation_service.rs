use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use serde::Serialize;
use uuid::Uuid;

use crate::confirmation_window::{ self, TimeRemaining };
use crate::db::entity::payment_confirmation;
use crate::db::{ bounded, ConfirmationStore, RestrictionState };
use crate::enums::{ ConfirmationStatus, Urgency };
use crate::error::{ AppError, Result };

#[derive(Debug, Clone)]
pub struct NewPaymentConfirmation {
    pub transaction_id: Uuid,
    pub seller_id: String,
    pub buyer_id: String,
    pub seller_timezone: String,
    pub notified_at: DateTime<Utc>,
}

/// A confirmation together with its countdown as of a given instant.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationView {
    pub confirmation: payment_confirmation::Model,
    /// `None` once the seller has confirmed.
    pub time_remaining: Option<TimeRemaining>,
    pub formatted_remaining: String,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub confirmation: payment_confirmation::Model,
    /// False when this call found the record already confirmed.
    pub changed: bool,
    pub restriction_active: bool,
}

pub struct PaymentConfirmationService {
    store: Arc<dyn ConfirmationStore>,
    store_timeout: Duration,
}

impl PaymentConfirmationService {
    pub fn new(store: Arc<dyn ConfirmationStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Record a buyer's payment and fix the seller's confirmation deadline.
    pub async fn record_payment(
        &self,
        req: NewPaymentConfirmation
    ) -> Result<payment_confirmation::Model> {
        if req.seller_id.trim().is_empty() {
            return Err(AppError::InvalidInput("seller_id must not be empty".to_string()));
        }

        // Unknown zones fail open inside the calculator, which logs the warning
        let deadline = confirmation_window::calculate_deadline(
            req.notified_at,
            &req.seller_timezone
        );
        let now = Utc::now();

        let confirmation = payment_confirmation::Model {
            transaction_id: req.transaction_id,
            seller_id: req.seller_id,
            buyer_id: req.buyer_id,
            seller_timezone: req.seller_timezone,
            notified_at: req.notified_at,
            deadline,
            status: ConfirmationStatus::Pending.to_string(),
            confirmed_at: None,
            expired_at: None,
            created_at: now,
            updated_at: now,
        };

        let confirmation = bounded(
            self.store_timeout,
            "insert_confirmation",
            self.store.insert_confirmation(confirmation)
        ).await?;

        tracing::info!(
            transaction_id = %confirmation.transaction_id,
            seller_id = %confirmation.seller_id,
            deadline = %confirmation.deadline,
            "Payment recorded, awaiting seller confirmation"
        );

        Ok(confirmation)
    }

    /// Seller acknowledges receipt. Works on pending and expired records alike;
    /// a late confirmation lifts the restriction once no other reasons remain.
    pub async fn confirm_payment(
        &self,
        transaction_id: Uuid,
        seller_id: &str,
        now: DateTime<Utc>
    ) -> Result<ConfirmOutcome> {
        let existing = self.find(transaction_id).await?;

        if existing.seller_id != seller_id {
            return Err(
                AppError::Forbidden(
                    format!("Transaction {} does not belong to seller {}", transaction_id, seller_id)
                )
            );
        }

        let updated = bounded(
            self.store_timeout,
            "mark_confirmed",
            self.store.mark_confirmed(transaction_id, now)
        ).await?;

        let (confirmation, changed) = match updated {
            Some(confirmation) => (confirmation, true),
            None => (self.find(transaction_id).await?, false),
        };

        // Runs on repeat confirmations too, so a reason left by an interrupted call is cleared
        let restriction_active = bounded(
            self.store_timeout,
            "remove_restriction_reason",
            self.store.remove_restriction_reason(seller_id, transaction_id, now)
        ).await?;

        if changed {
            tracing::info!(
                %transaction_id,
                seller_id,
                late = existing.status() == ConfirmationStatus::Expired,
                restriction_active,
                "Payment confirmed by seller"
            );
        }

        Ok(ConfirmOutcome {
            confirmation,
            changed,
            restriction_active,
        })
    }

    pub async fn confirmation_status(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<ConfirmationView> {
        let confirmation = self.find(transaction_id).await?;
        Ok(Self::view(confirmation, now))
    }

    /// Outstanding (pending or expired) confirmations for a seller, earliest deadline first.
    pub async fn pending_for_seller(
        &self,
        seller_id: &str,
        now: DateTime<Utc>
    ) -> Result<Vec<ConfirmationView>> {
        let outstanding = bounded(
            self.store_timeout,
            "find_outstanding_for_seller",
            self.store.find_outstanding_for_seller(seller_id)
        ).await?;

        Ok(
            outstanding
                .into_iter()
                .map(|c| Self::view(c, now))
                .collect()
        )
    }

    pub async fn restriction(&self, seller_id: &str) -> Result<RestrictionState> {
        let restriction = bounded(
            self.store_timeout,
            "find_restriction",
            self.store.find_restriction(seller_id)
        ).await?;

        Ok(restriction.unwrap_or_else(|| RestrictionState::inactive(seller_id)))
    }

    async fn find(&self, transaction_id: Uuid) -> Result<payment_confirmation::Model> {
        bounded(
            self.store_timeout,
            "find_confirmation",
            self.store.find_confirmation(transaction_id)
        ).await?.ok_or_else(||
            AppError::NotFound(format!("Payment confirmation for transaction {}", transaction_id))
        )
    }

    fn view(confirmation: payment_confirmation::Model, now: DateTime<Utc>) -> ConfirmationView {
        // Settled records have nothing left to count down
        let (time_remaining, formatted_remaining, urgency) = if confirmation.is_confirmed() {
            (None, "Confirmed".to_string(), Urgency::Normal)
        } else {
            (
                Some(confirmation_window::time_remaining_at(confirmation.deadline, now)),
                confirmation_window::format_remaining_at(confirmation.deadline, now),
                confirmation_window::urgency_at(confirmation.deadline, now),
            )
        };

        ConfirmationView {
            confirmation,
            time_remaining,
            formatted_remaining,
            urgency,
        }
    }
}
