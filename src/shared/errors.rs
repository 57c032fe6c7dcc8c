use thiserror::Error;

use crate::domain::reservation::{ReservationStatus, Trigger};

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Station {0} is not available for booking")]
    ResourceUnavailable(String),

    #[error("Requested window overlaps {} active reservation(s) on station {station_id}", conflicts.len())]
    WindowConflict {
        station_id: String,
        conflicts: Vec<String>,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("PIN does not match reservation {0}")]
    PinMismatch(String),

    #[error("Reservation {0} is outside its booked window")]
    OutOfWindow(String),

    #[error("Cannot apply {trigger} to reservation in state {from}")]
    InvalidTransition {
        from: ReservationStatus,
        trigger: Trigger,
    },

    #[error("Concurrent modification of {0}")]
    ConcurrencyConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: value.into(),
        }
    }

    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            Self::WindowConflict { .. } => "WINDOW_CONFLICT",
            Self::Forbidden(_) => "AUTHORIZATION_ERROR",
            Self::PinMismatch(_) => "PIN_MISMATCH",
            Self::OutOfWindow(_) => "OUT_OF_WINDOW",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether the operation may succeed if re-run from the start.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(e.to_string())
    }
}
