//! Parking session (activity) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{ActivityId, UserId};
use crate::error::DomainError;

/// Where a vehicle is in its parking session.
///
/// Transitions are plain field updates; nothing forbids going backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParkingStatus {
    PendingEntry,
    Parked,
    PendingExit,
    Exited,
}

impl AsRef<str> for ParkingStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::PendingEntry => "PENDING_ENTRY",
            Self::Parked => "PARKED",
            Self::PendingExit => "PENDING_EXIT",
            Self::Exited => "EXITED",
        }
    }
}

impl std::fmt::Display for ParkingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for ParkingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ENTRY" => Ok(Self::PendingEntry),
            "PARKED" => Ok(Self::Parked),
            "PENDING_EXIT" => Ok(Self::PendingExit),
            "EXITED" => Ok(Self::Exited),
            other => Err(DomainError::ValidationError(format!(
                "Unknown parking status: {}",
                other
            ))),
        }
    }
}

/// One vehicle session at a lot.
#[derive(Debug, Clone)]
pub struct ParkingActivity {
    pub id: ActivityId,
    pub holder: UserId,
    pub lot_id: i64,
    pub status: ParkingStatus,
    pub created_at: DateTime<Utc>,
    pub exit_datetime: Option<DateTime<Utc>>,
    pub exception_flag: Option<String>,
    pub gate_response: Option<String>,
}

impl ParkingActivity {
    /// Opens a session for a vehicle that just entered the lot.
    pub fn enter(holder: UserId, lot_id: i64) -> Self {
        Self {
            id: ActivityId::new(),
            holder,
            lot_id,
            status: ParkingStatus::Parked,
            created_at: Utc::now(),
            exit_datetime: None,
            exception_flag: None,
            gate_response: None,
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}
