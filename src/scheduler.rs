use crate::services::DeadlineEvaluator;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{ interval, Duration, MissedTickBehavior };

/// Runs the deadline scan in-process on a fixed interval.
///
/// Only needed when no external cron calls `/api/cron/check-deadlines`.
pub struct DeadlineScheduler {
    evaluator: Arc<DeadlineEvaluator>,
    period: Duration,
}

impl DeadlineScheduler {
    pub fn new(evaluator: Arc<DeadlineEvaluator>, period: Duration) -> Self {
        Self {
            evaluator,
            period,
        }
    }

    pub async fn start(self) {
        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            // Failures wait for the next tick; there is no retry in between
            match self.evaluator.run(Utc::now()).await {
                Ok(report) if report.newly_expired > 0 => {
                    tracing::info!(
                        newly_expired = report.newly_expired,
                        "Scheduled deadline scan expired confirmations"
                    );
                }
                Ok(_) => tracing::debug!("Scheduled deadline scan found nothing new"),
                Err(e) => tracing::error!("Scheduled deadline scan failed: {}", e),
            }
        }
    }
}
