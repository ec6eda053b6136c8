use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use serde::Serialize;

use crate::db::{ bounded, ConfirmationStore };
use crate::error::Result;

/// Outcome of one deadline scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// Confirmations this run moved from pending to expired.
    pub newly_expired: u64,
    pub scanned_at: DateTime<Utc>,
}

/// Expires overdue payment confirmations and restricts the owning sellers.
///
/// Safe to run concurrently with itself: only the run whose conditional
/// update succeeds counts a record.
pub struct DeadlineEvaluator {
    store: Arc<dyn ConfirmationStore>,
    store_timeout: Duration,
}

impl DeadlineEvaluator {
    pub fn new(store: Arc<dyn ConfirmationStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Scan once as of `now`. The first store failure aborts the scan;
    /// records already expired stay expired with their restriction.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let overdue = bounded(
            self.store_timeout,
            "find_overdue",
            self.store.find_overdue(now)
        ).await?;

        tracing::debug!(candidates = overdue.len(), "Deadline scan started");

        let mut newly_expired = 0u64;

        for confirmation in overdue {
            let seller_id = confirmation.seller_id.as_str();
            let transaction_id = confirmation.transaction_id;

            let expired = bounded(
                self.store_timeout,
                "expire_and_restrict",
                self.store.expire_and_restrict(seller_id, transaction_id, now)
            ).await?;

            if expired {
                newly_expired += 1;
                tracing::info!(
                    %transaction_id,
                    seller_id,
                    deadline = %confirmation.deadline,
                    "Payment confirmation expired, seller restricted"
                );
            } else {
                tracing::debug!(%transaction_id, "Already settled since the scan read it");
            }
        }

        Ok(ScanReport {
            newly_expired,
            scanned_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entity::payment_confirmation;
    use crate::db::{ MemoryConfirmationStore, RestrictionState };
    use crate::enums::ConfirmationStatus;
    use crate::error::AppError;
    use crate::services::{ NewPaymentConfirmation, PaymentConfirmationService };
    use chrono::{ Duration as ChronoDuration, TimeZone };
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn pending(seller_id: &str, deadline: DateTime<Utc>) -> payment_confirmation::Model {
        payment_confirmation::Model {
            transaction_id: Uuid::new_v4(),
            seller_id: seller_id.to_string(),
            buyer_id: "buyer-1".to_string(),
            seller_timezone: "UTC".to_string(),
            notified_at: deadline - ChronoDuration::hours(12),
            deadline,
            status: ConfirmationStatus::Pending.to_string(),
            confirmed_at: None,
            expired_at: None,
            created_at: deadline - ChronoDuration::hours(12),
            updated_at: deadline - ChronoDuration::hours(12),
        }
    }

    fn evaluator(store: Arc<MemoryConfirmationStore>) -> DeadlineEvaluator {
        DeadlineEvaluator::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_overdue_confirmation_is_expired_and_seller_restricted() {
        let store = Arc::new(MemoryConfirmationStore::new());
        let overdue = store
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::minutes(1))).await
            .unwrap();

        let report = evaluator(store.clone()).run(now()).await.unwrap();
        assert_eq!(report.newly_expired, 1);
        assert_eq!(report.scanned_at, now());

        let stored = store.find_confirmation(overdue.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConfirmationStatus::Expired);
        assert_eq!(stored.expired_at, Some(now()));

        let restriction = store.find_restriction("seller-1").await.unwrap().unwrap();
        assert!(restriction.active);
        assert_eq!(restriction.reasons, vec![overdue.transaction_id]);
    }

    #[tokio::test]
    async fn test_deadline_exactly_now_counts_as_overdue() {
        let store = Arc::new(MemoryConfirmationStore::new());
        store.insert_confirmation(pending("seller-1", now())).await.unwrap();

        let report = evaluator(store).run(now()).await.unwrap();
        assert_eq!(report.newly_expired, 1);
    }

    #[tokio::test]
    async fn test_future_deadlines_are_left_alone() {
        let store = Arc::new(MemoryConfirmationStore::new());
        let upcoming = store
            .insert_confirmation(pending("seller-1", now() + ChronoDuration::minutes(5))).await
            .unwrap();

        let report = evaluator(store.clone()).run(now()).await.unwrap();
        assert_eq!(report.newly_expired, 0);

        let stored = store.find_confirmation(upcoming.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConfirmationStatus::Pending);
        assert!(store.find_restriction("seller-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_run_reports_zero() {
        let store = Arc::new(MemoryConfirmationStore::new());
        store
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::hours(1))).await
            .unwrap();
        store
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::hours(2))).await
            .unwrap();

        let evaluator = evaluator(store.clone());
        assert_eq!(evaluator.run(now()).await.unwrap().newly_expired, 2);
        assert_eq!(evaluator.run(now()).await.unwrap().newly_expired, 0);

        let restriction = store.find_restriction("seller-1").await.unwrap().unwrap();
        assert_eq!(restriction.reasons.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_runs_count_each_record_once() {
        let store = Arc::new(MemoryConfirmationStore::new());
        for i in 0..10 {
            store
                .insert_confirmation(
                    pending(&format!("seller-{}", i % 3), now() - ChronoDuration::minutes(i + 1))
                ).await
                .unwrap();
        }

        let a = evaluator(store.clone());
        let b = evaluator(store.clone());
        let (ra, rb) = tokio::join!(a.run(now()), b.run(now()));

        assert_eq!(ra.unwrap().newly_expired + rb.unwrap().newly_expired, 10);

        let total_reasons: usize = count_reasons(&store, &["seller-0", "seller-1", "seller-2"]).await;
        assert_eq!(total_reasons, 10);
    }

    async fn count_reasons(store: &MemoryConfirmationStore, sellers: &[&str]) -> usize {
        let mut total = 0;
        for seller in sellers {
            if let Some(r) = store.find_restriction(seller).await.unwrap() {
                total += r.reasons.len();
            }
        }
        total
    }

    /// Wraps the memory store to serve a fixed overdue snapshot and to fail
    /// the nth expiry, the way a scan sees a stale read or a dropped connection.
    struct ScriptedStore {
        inner: Arc<MemoryConfirmationStore>,
        snapshot: Option<Vec<payment_confirmation::Model>>,
        fail_expiry_at: Option<usize>,
        expiry_calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(inner: Arc<MemoryConfirmationStore>) -> Self {
            Self {
                inner,
                snapshot: None,
                fail_expiry_at: None,
                expiry_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ConfirmationStore for ScriptedStore {
        async fn insert_confirmation(
            &self,
            confirmation: payment_confirmation::Model
        ) -> Result<payment_confirmation::Model> {
            self.inner.insert_confirmation(confirmation).await
        }

        async fn find_confirmation(
            &self,
            transaction_id: Uuid
        ) -> Result<Option<payment_confirmation::Model>> {
            self.inner.find_confirmation(transaction_id).await
        }

        async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<payment_confirmation::Model>> {
            match &self.snapshot {
                Some(snapshot) => Ok(snapshot.clone()),
                None => self.inner.find_overdue(now).await,
            }
        }

        async fn find_outstanding_for_seller(
            &self,
            seller_id: &str
        ) -> Result<Vec<payment_confirmation::Model>> {
            self.inner.find_outstanding_for_seller(seller_id).await
        }

        async fn expire_and_restrict(
            &self,
            seller_id: &str,
            transaction_id: Uuid,
            now: DateTime<Utc>
        ) -> Result<bool> {
            let call = self.expiry_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_expiry_at == Some(call) {
                return Err(AppError::Timeout("expire_and_restrict".to_string()));
            }
            self.inner.expire_and_restrict(seller_id, transaction_id, now).await
        }

        async fn mark_confirmed(
            &self,
            transaction_id: Uuid,
            now: DateTime<Utc>
        ) -> Result<Option<payment_confirmation::Model>> {
            self.inner.mark_confirmed(transaction_id, now).await
        }

        async fn remove_restriction_reason(
            &self,
            seller_id: &str,
            transaction_id: Uuid,
            now: DateTime<Utc>
        ) -> Result<bool> {
            self.inner.remove_restriction_reason(seller_id, transaction_id, now).await
        }

        async fn find_restriction(&self, seller_id: &str) -> Result<Option<RestrictionState>> {
            self.inner.find_restriction(seller_id).await
        }
    }

    #[tokio::test]
    async fn test_confirmed_after_read_is_not_restricted() {
        let inner = Arc::new(MemoryConfirmationStore::new());
        let record = inner
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::minutes(1))).await
            .unwrap();
        let snapshot = inner.find_overdue(now()).await.unwrap();
        inner.mark_confirmed(record.transaction_id, now()).await.unwrap();

        let mut store = ScriptedStore::new(inner.clone());
        store.snapshot = Some(snapshot);
        let report = DeadlineEvaluator::new(Arc::new(store), Duration::from_secs(5))
            .run(now()).await
            .unwrap();
        assert_eq!(report.newly_expired, 0);

        assert!(inner.find_restriction("seller-1").await.unwrap().is_none());
        let stored = inner.find_confirmation(record.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConfirmationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_expiry_after_seller_confirmed_leaves_seller_unrestricted() {
        let inner = Arc::new(MemoryConfirmationStore::new());
        let service = PaymentConfirmationService::new(inner.clone(), Duration::from_secs(5));
        let recorded = service
            .record_payment(NewPaymentConfirmation {
                transaction_id: Uuid::new_v4(),
                seller_id: "seller-1".to_string(),
                buyer_id: "buyer-1".to_string(),
                seller_timezone: "UTC".to_string(),
                notified_at: now() - ChronoDuration::days(2),
            }).await
            .unwrap();

        let snapshot = inner.find_overdue(now()).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        service.confirm_payment(recorded.transaction_id, "seller-1", now()).await.unwrap();

        let mut store = ScriptedStore::new(inner.clone());
        store.snapshot = Some(snapshot);
        store.fail_expiry_at = Some(0);
        let err = DeadlineEvaluator::new(Arc::new(store), Duration::from_secs(5))
            .run(now()).await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));

        let report = evaluator(inner.clone()).run(now()).await.unwrap();
        assert_eq!(report.newly_expired, 0);

        let restriction = service.restriction("seller-1").await.unwrap();
        assert!(!restriction.active);
        assert!(restriction.reasons.is_empty());

        let stored = inner.find_confirmation(recorded.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConfirmationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failure_midway_keeps_earlier_expiries() {
        let inner = Arc::new(MemoryConfirmationStore::new());
        let first = inner
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::hours(3))).await
            .unwrap();
        let second = inner
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::hours(2))).await
            .unwrap();
        let third = inner
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::hours(1))).await
            .unwrap();

        let mut store = ScriptedStore::new(inner.clone());
        store.fail_expiry_at = Some(2);
        let err = DeadlineEvaluator::new(Arc::new(store), Duration::from_secs(5))
            .run(now()).await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));

        for done in [&first, &second] {
            let stored = inner.find_confirmation(done.transaction_id).await.unwrap().unwrap();
            assert_eq!(stored.status(), ConfirmationStatus::Expired);
        }
        let stored = inner.find_confirmation(third.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConfirmationStatus::Pending);

        let restriction = inner.find_restriction("seller-1").await.unwrap().unwrap();
        assert!(restriction.active);
        assert_eq!(restriction.reasons.len(), 2);
        assert!(restriction.reasons.contains(&first.transaction_id));
        assert!(restriction.reasons.contains(&second.transaction_id));

        let report = evaluator(inner.clone()).run(now()).await.unwrap();
        assert_eq!(report.newly_expired, 1);

        let restriction = inner.find_restriction("seller-1").await.unwrap().unwrap();
        assert_eq!(restriction.reasons.len(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_scan() {
        let store = Arc::new(MemoryConfirmationStore::new());
        store
            .insert_confirmation(pending("seller-1", now() - ChronoDuration::minutes(1))).await
            .unwrap();
        store.set_unavailable(true);

        let err = evaluator(store).run(now()).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = Arc::new(MemoryConfirmationStore::new());
        store.set_latency(Some(Duration::from_millis(200)));

        let evaluator = DeadlineEvaluator::new(store, Duration::from_millis(20));
        let err = evaluator.run(now()).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
