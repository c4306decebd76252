//! Allocation state machine.

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// The status of an allocation in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Fulfilled
///    │            │
///    ├────────────┴──► Cancelled
///    └──► Fulfilled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    /// Stock is reserved and the allocation may expire.
    #[default]
    Pending,

    /// Reservation is held without expiry, typically after payment capture.
    Confirmed,

    /// Reserved stock was consumed by a sale (terminal state).
    Fulfilled,

    /// Reservation was released (terminal state).
    Cancelled,
}

impl AllocationStatus {
    pub fn can_confirm(&self) -> bool {
        matches!(self, AllocationStatus::Pending)
    }

    pub fn can_fulfill(&self) -> bool {
        matches!(self, AllocationStatus::Pending | AllocationStatus::Confirmed)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, AllocationStatus::Pending | AllocationStatus::Confirmed)
    }

    /// Returns true if quantity or warehouse may still be changed.
    pub fn can_update(&self) -> bool {
        matches!(self, AllocationStatus::Pending)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, AllocationStatus::Fulfilled | AllocationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Pending => "PENDING",
            AllocationStatus::Confirmed => "CONFIRMED",
            AllocationStatus::Fulfilled => "FULFILLED",
            AllocationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AllocationStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AllocationStatus::Pending),
            "CONFIRMED" => Ok(AllocationStatus::Confirmed),
            "FULFILLED" => Ok(AllocationStatus::Fulfilled),
            "CANCELLED" => Ok(AllocationStatus::Cancelled),
            other => Err(InventoryError::Validation(format!(
                "unknown allocation status: {other}"
            ))),
        }
    }
}
