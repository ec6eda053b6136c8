use axum::{ extract::{ Path, State }, Json };
use chrono::Utc;

use crate::db::RestrictionState;
use crate::error::Result;
use crate::services::confirmation_service::ConfirmationView;

use super::AppState;

pub async fn get_restriction(
    State(state): State<AppState>,
    Path(seller_id): Path<String>
) -> Result<Json<RestrictionState>> {
    let restriction = state.confirmation_service.restriction(&seller_id).await?;

    Ok(Json(restriction))
}

pub async fn list_outstanding(
    State(state): State<AppState>,
    Path(seller_id): Path<String>
) -> Result<Json<Vec<ConfirmationView>>> {
    let outstanding = state.confirmation_service.pending_for_seller(&seller_id, Utc::now()).await?;

    Ok(Json(outstanding))
}
