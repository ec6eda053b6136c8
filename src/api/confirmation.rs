use axum::{ extract::{ Path, State }, http::StatusCode, Json };
use chrono::{ DateTime, Utc };
use serde::Deserialize;
use uuid::Uuid;

use crate::db::entity::payment_confirmation;
use crate::error::Result;
use crate::services::confirmation_service::{ ConfirmOutcome, ConfirmationView };
use crate::services::NewPaymentConfirmation;

use super::AppState;

#[derive(Deserialize)]
pub struct RecordPaymentRequest {
    pub transaction_id: Uuid,
    pub seller_id: String,
    pub buyer_id: String,
    pub seller_timezone: String,
    /// Defaults to the time the request is handled.
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub seller_id: String,
}

pub async fn record_payment(
    State(state): State<AppState>,
    Json(request): Json<RecordPaymentRequest>
) -> Result<(StatusCode, Json<payment_confirmation::Model>)> {
    let confirmation = state.confirmation_service.record_payment(NewPaymentConfirmation {
        transaction_id: request.transaction_id,
        seller_id: request.seller_id,
        buyer_id: request.buyer_id,
        seller_timezone: request.seller_timezone,
        notified_at: request.notified_at.unwrap_or_else(Utc::now),
    }).await?;

    Ok((StatusCode::CREATED, Json(confirmation)))
}

pub async fn get_confirmation(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>
) -> Result<Json<ConfirmationView>> {
    let view = state.confirmation_service.confirmation_status(transaction_id, Utc::now()).await?;

    Ok(Json(view))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<ConfirmPaymentRequest>
) -> Result<Json<ConfirmOutcome>> {
    let outcome = state.confirmation_service.confirm_payment(
        transaction_id,
        &request.seller_id,
        Utc::now()
    ).await?;

    Ok(Json(outcome))
}
