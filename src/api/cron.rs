use axum::{ extract::State, http::{ header::AUTHORIZATION, HeaderMap }, Json };
use chrono::{ SecondsFormat, Utc };
use serde::Serialize;
use sha2::{ Digest, Sha256 };

use crate::error::{ AppError, Result };

use super::AppState;

/// Shared secret the external scheduler presents as `Authorization: Bearer <secret>`.
///
/// Only the SHA-256 digest is kept; comparison runs over the whole digest.
pub struct CronSecret {
    digest: Vec<u8>,
}

impl CronSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).to_vec(),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = Sha256::digest(candidate.as_bytes());
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }

    pub fn verify(&self, headers: &HeaderMap) -> Result<()> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        if self.matches(token.trim()) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckDeadlinesResponse {
    pub success: bool,
    pub expired_count: u64,
    pub timestamp: String,
}

/// Trigger for the external cron: expire overdue confirmations and restrict sellers.
pub async fn check_deadlines(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<CheckDeadlinesResponse>> {
    if let Err(e) = state.cron_secret.verify(&headers) {
        tracing::warn!("Rejected deadline check: missing or invalid cron secret");
        return Err(e);
    }

    let report = state.deadline_evaluator.run(Utc::now()).await.map_err(|e| {
        tracing::error!("Deadline check failed: {}", e);
        e
    })?;

    tracing::info!(expired_count = report.newly_expired, "Deadline check completed");

    Ok(
        Json(CheckDeadlinesResponse {
            success: true,
            expired_count: report.newly_expired,
            timestamp: report.scanned_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    )
}
