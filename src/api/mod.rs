use std::sync::Arc;

use axum::{ routing::{ get, post }, Router };
use tower_http::{ cors::CorsLayer, trace::TraceLayer };

pub mod cron;
pub mod confirmation;
pub mod seller;

use crate::services::{ DeadlineEvaluator, PaymentConfirmationService };

pub use cron::CronSecret;

#[derive(Clone)]
pub struct AppState {
    pub confirmation_service: Arc<PaymentConfirmationService>,
    pub deadline_evaluator: Arc<DeadlineEvaluator>,
    pub cron_secret: Arc<CronSecret>,
}

impl AppState {
    pub fn new(
        confirmation_service: Arc<PaymentConfirmationService>,
        deadline_evaluator: Arc<DeadlineEvaluator>,
        cron_secret: CronSecret
    ) -> Self {
        Self {
            confirmation_service,
            deadline_evaluator,
            cron_secret: Arc::new(cron_secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/cron/check-deadlines",
            get(cron::check_deadlines).post(cron::check_deadlines)
        )
        .route("/api/confirmations", post(confirmation::record_payment))
        .route("/api/confirmations/{transaction_id}", get(confirmation::get_confirmation))
        .route(
            "/api/confirmations/{transaction_id}/confirm",
            post(confirmation::confirm_payment)
        )
        .route("/api/sellers/{seller_id}/restriction", get(seller::get_restriction))
        .route("/api/sellers/{seller_id}/confirmations", get(seller::list_outstanding))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "OK"
}
