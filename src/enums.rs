use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── ConfirmationStatus ─────────────────────────────────────────────

/// Lifecycle of a seller's payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Expired,
}

impl ConfirmationStatus {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Expired => "expired",
        }
    }

    /// Whether the seller still owes a confirmation (on time or late).
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, ConfirmationStatus::Confirmed)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConfirmationStatus::Pending),
            "confirmed" => Ok(ConfirmationStatus::Confirmed),
            "expired" => Ok(ConfirmationStatus::Expired),
            _ => Err(AppError::InvalidInput(format!("Invalid confirmation status: {}", s))),
        }
    }
}

// ─── Urgency ────────────────────────────────────────────────────────

/// Countdown urgency shown next to a confirmation deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Approaching,
    Critical,
    Expired,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Approaching => "approaching",
            Urgency::Critical => "critical",
            Urgency::Expired => "expired",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
