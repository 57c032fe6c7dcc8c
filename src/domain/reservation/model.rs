//! Reservation domain entity and its state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::errors::DomainError;

/// How long after `start_time` an unconfirmed reservation stays valid.
pub const ARRIVAL_GRACE_MINUTES: i64 = 30;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ReservationStatus {
    /// Slot is held, user has not arrived yet
    Booked,
    /// User arrived (or an admin accepted) and is charging
    InUse,
    /// Session finished by the owner
    Completed,
    /// Cancelled by the user, an admin, or the expiration sweep
    Cancel,
}

impl ReservationStatus {
    pub const ACTIVE: [ReservationStatus; 2] = [Self::Booked, Self::InUse];
    pub const TERMINAL: [ReservationStatus; 2] = [Self::Completed, Self::Cancel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "Booked",
            Self::InUse => "InUse",
            Self::Completed => "Completed",
            Self::Cancel => "Cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Booked" => Some(Self::Booked),
            "InUse" => Some(Self::InUse),
            "Completed" => Some(Self::Completed),
            "Cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Booked | Self::InUse)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What asked for a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    ConfirmArrival,
    AdminAccept,
    UserCancel,
    AdminCancel,
    ExpirationSweep,
    UserComplete,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmArrival => "ConfirmArrival",
            Self::AdminAccept => "AdminAccept",
            Self::UserCancel => "UserCancel",
            Self::AdminCancel => "AdminCancel",
            Self::ExpirationSweep => "ExpirationSweep",
            Self::UserComplete => "UserComplete",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the trigger is not valid from `from`.
pub fn transition_target(from: ReservationStatus, trigger: Trigger) -> Option<ReservationStatus> {
    use ReservationStatus::*;
    use Trigger::*;

    match (from, trigger) {
        (Booked, ConfirmArrival) | (Booked, AdminAccept) => Some(InUse),
        (Booked, UserCancel) | (Booked, AdminCancel) | (Booked, ExpirationSweep) => Some(Cancel),
        (InUse, UserComplete) => Some(Completed),
        (InUse, AdminCancel) => Some(Cancel),
        (Booked, UserComplete)
        | (InUse, ConfirmArrival)
        | (InUse, AdminAccept)
        | (InUse, UserCancel)
        | (InUse, ExpirationSweep)
        | (Completed, _)
        | (Cancel, _) => None,
    }
}

/// Half-open booking window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::Validation(format!(
                "invalid window: start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Strict overlap; windows that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        other.start < self.end && self.start < other.end
    }

    /// Arrival is accepted anywhere in `[start, end]`, both ends inclusive.
    pub fn admits_arrival_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A user's claim on a station for a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub station_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    /// 6-digit arrival code
    pub pin: String,
    pub arrived: bool,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// New reservation in state `Booked`.
    pub fn new(
        station_id: impl Into<String>,
        user_id: impl Into<String>,
        window: TimeWindow,
        pin: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            station_id: station_id.into(),
            user_id: user_id.into(),
            start_time: window.start,
            end_time: window.end,
            expiration_time: window.start + Duration::minutes(ARRIVAL_GRACE_MINUTES),
            pin: pin.into(),
            arrived: false,
            status: ReservationStatus::Booked,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Unconfirmed and past its expiration time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Booked && now > self.expiration_time
    }

    /// Apply a patch in memory, as the store does on a successful update.
    pub fn apply(&mut self, patch: &ReservationPatch) {
        self.status = patch.status;
        if let Some(arrived) = patch.arrived {
            self.arrived = arrived;
        }
        self.updated_at = patch.updated_at;
    }
}

/// Fields written by a conditional reservation update.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationPatch {
    pub status: ReservationStatus,
    pub arrived: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationPatch {
    pub fn status(status: ReservationStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            arrived: None,
            updated_at: now,
        }
    }

    pub fn with_arrived(mut self, arrived: bool) -> Self {
        self.arrived = Some(arrived);
        self
    }
}

// ── Tests ──────────────────────────────────────────────────────
