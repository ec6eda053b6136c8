use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use sea_orm::{
    sea_query::{ Expr, OnConflict },
    ActiveValue,
    ColumnTrait,
    DatabaseConnection,
    DbErr,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
    SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::db::entity::{
    account_restriction,
    payment_confirmation,
    restriction_reason,
    AccountRestriction,
    PaymentConfirmation,
    RestrictionReason,
};
use crate::db::{ ConfirmationStore, RestrictionState };
use crate::enums::ConfirmationStatus;
use crate::error::{ AppError, Result };

/// Postgres-backed store.
pub struct SeaOrmConfirmationStore {
    db: DatabaseConnection,
}

impl SeaOrmConfirmationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn map_insert_error(err: DbErr, transaction_id: Uuid) -> AppError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) =>
                AppError::InvalidInput(
                    format!("Payment confirmation for transaction {} already exists", transaction_id)
                ),
            _ => AppError::Database(err),
        }
    }
}

#[async_trait]
impl ConfirmationStore for SeaOrmConfirmationStore {
    async fn insert_confirmation(
        &self,
        confirmation: payment_confirmation::Model
    ) -> Result<payment_confirmation::Model> {
        let transaction_id = confirmation.transaction_id;
        let active_model = payment_confirmation::ActiveModel {
            transaction_id: ActiveValue::Set(confirmation.transaction_id),
            seller_id: ActiveValue::Set(confirmation.seller_id),
            buyer_id: ActiveValue::Set(confirmation.buyer_id),
            seller_timezone: ActiveValue::Set(confirmation.seller_timezone),
            notified_at: ActiveValue::Set(confirmation.notified_at),
            deadline: ActiveValue::Set(confirmation.deadline),
            status: ActiveValue::Set(confirmation.status),
            confirmed_at: ActiveValue::Set(confirmation.confirmed_at),
            expired_at: ActiveValue::Set(confirmation.expired_at),
            created_at: ActiveValue::Set(confirmation.created_at),
            updated_at: ActiveValue::Set(confirmation.updated_at),
        };

        PaymentConfirmation::insert(active_model)
            .exec_with_returning(&self.db).await
            .map_err(|e| Self::map_insert_error(e, transaction_id))
    }

    async fn find_confirmation(
        &self,
        transaction_id: Uuid
    ) -> Result<Option<payment_confirmation::Model>> {
        let confirmation = PaymentConfirmation::find_by_id(transaction_id).one(&self.db).await?;
        Ok(confirmation)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<payment_confirmation::Model>> {
        let overdue = PaymentConfirmation::find()
            .filter(
                payment_confirmation::Column::Status.eq(ConfirmationStatus::Pending.as_str())
            )
            .filter(payment_confirmation::Column::Deadline.lte(now))
            .order_by_asc(payment_confirmation::Column::Deadline)
            .all(&self.db).await?;

        Ok(overdue)
    }

    async fn find_outstanding_for_seller(
        &self,
        seller_id: &str
    ) -> Result<Vec<payment_confirmation::Model>> {
        let outstanding = PaymentConfirmation::find()
            .filter(payment_confirmation::Column::SellerId.eq(seller_id))
            .filter(
                payment_confirmation::Column::Status.ne(ConfirmationStatus::Confirmed.as_str())
            )
            .order_by_asc(payment_confirmation::Column::Deadline)
            .all(&self.db).await?;

        Ok(outstanding)
    }

    async fn mark_confirmed(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<Option<payment_confirmation::Model>> {
        let result = PaymentConfirmation::update_many()
            .col_expr(
                payment_confirmation::Column::Status,
                Expr::value(ConfirmationStatus::Confirmed.as_str())
            )
            .col_expr(payment_confirmation::Column::ConfirmedAt, Expr::value(now))
            .col_expr(payment_confirmation::Column::UpdatedAt, Expr::value(now))
            .filter(payment_confirmation::Column::TransactionId.eq(transaction_id))
            .filter(
                payment_confirmation::Column::Status.ne(ConfirmationStatus::Confirmed.as_str())
            )
            .exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_confirmation(transaction_id).await
    }

    async fn expire_and_restrict(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        let result = PaymentConfirmation::update_many()
            .col_expr(
                payment_confirmation::Column::Status,
                Expr::value(ConfirmationStatus::Expired.as_str())
            )
            .col_expr(payment_confirmation::Column::ExpiredAt, Expr::value(now))
            .col_expr(payment_confirmation::Column::UpdatedAt, Expr::value(now))
            .filter(payment_confirmation::Column::TransactionId.eq(transaction_id))
            .filter(payment_confirmation::Column::SellerId.eq(seller_id))
            .filter(
                payment_confirmation::Column::Status.eq(ConfirmationStatus::Pending.as_str())
            )
            .filter(payment_confirmation::Column::Deadline.lte(now))
            .exec(&txn).await?;

        // Already expired by another scan, or confirmed since it was read
        if result.rows_affected != 1 {
            txn.commit().await?;
            return Ok(false);
        }

        let restriction = account_restriction::ActiveModel {
            seller_id: ActiveValue::Set(seller_id.to_string()),
            active: ActiveValue::Set(true),
            updated_at: ActiveValue::Set(now),
        };

        AccountRestriction::insert(restriction)
            .on_conflict(
                OnConflict::column(account_restriction::Column::SellerId)
                    .update_columns([
                        account_restriction::Column::Active,
                        account_restriction::Column::UpdatedAt,
                    ])
                    .to_owned()
            )
            .exec_without_returning(&txn).await?;

        let reason = restriction_reason::ActiveModel {
            seller_id: ActiveValue::Set(seller_id.to_string()),
            transaction_id: ActiveValue::Set(transaction_id),
            created_at: ActiveValue::Set(now),
        };

        RestrictionReason::insert(reason)
            .on_conflict(
                OnConflict::columns([
                    restriction_reason::Column::SellerId,
                    restriction_reason::Column::TransactionId,
                ])
                    .do_nothing()
                    .to_owned()
            )
            .exec_without_returning(&txn).await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn remove_restriction_reason(
        &self,
        seller_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        // Row lock serialises this against a concurrent add for the same seller
        let restriction = AccountRestriction::find_by_id(seller_id.to_string())
            .lock_exclusive()
            .one(&txn).await?;

        if restriction.is_none() {
            txn.commit().await?;
            return Ok(false);
        }

        RestrictionReason::delete_many()
            .filter(restriction_reason::Column::SellerId.eq(seller_id))
            .filter(restriction_reason::Column::TransactionId.eq(transaction_id))
            .exec(&txn).await?;

        let remaining = RestrictionReason::find()
            .filter(restriction_reason::Column::SellerId.eq(seller_id))
            .count(&txn).await?;

        let still_active = remaining > 0;

        AccountRestriction::update_many()
            .col_expr(account_restriction::Column::Active, Expr::value(still_active))
            .col_expr(account_restriction::Column::UpdatedAt, Expr::value(now))
            .filter(account_restriction::Column::SellerId.eq(seller_id))
            .exec(&txn).await?;

        txn.commit().await?;
        Ok(still_active)
    }

    async fn find_restriction(&self, seller_id: &str) -> Result<Option<RestrictionState>> {
        let Some(restriction) = AccountRestriction::find_by_id(seller_id.to_string()).one(
            &self.db
        ).await? else {
            return Ok(None);
        };

        let reasons = RestrictionReason::find()
            .filter(restriction_reason::Column::SellerId.eq(seller_id))
            .order_by_asc(restriction_reason::Column::CreatedAt)
            .order_by_asc(restriction_reason::Column::TransactionId)
            .all(&self.db).await?
            .into_iter()
            .map(|r| r.transaction_id)
            .collect();

        Ok(
            Some(RestrictionState {
                seller_id: restriction.seller_id,
                active: restriction.active,
                reasons,
                updated_at: Some(restriction.updated_at),
            })
        )
    }
}
