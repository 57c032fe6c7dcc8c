//! Charging station domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::reservation::{Reservation, ReservationStatus};

/// Station status, always derived from the station's active reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum StationStatus {
    Available,
    Booked,
    InUse,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Booked => "Booked",
            Self::InUse => "InUse",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Booked" => Some(Self::Booked),
            "InUse" => Some(Self::InUse),
            _ => None,
        }
    }

    /// InUse wins over Booked; no active reservation means Available.
    pub fn derive<'a>(reservations: impl IntoIterator<Item = &'a Reservation>) -> Self {
        let mut status = Self::Available;
        for r in reservations {
            match r.status {
                ReservationStatus::InUse => return Self::InUse,
                ReservationStatus::Booked => status = Self::Booked,
                ReservationStatus::Completed | ReservationStatus::Cancel => {}
            }
        }
        status
    }
}

impl std::fmt::Display for StationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-lived claim that serialises admissions on one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionHold {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AdmissionHold {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A physical charging station
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    /// Human-facing label printed on the unit (e.g. "CP-07")
    pub code: String,
    pub status: StationStatus,
    /// Bumped on every status write
    pub revision: i64,
    pub hold: Option<AdmissionHold>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    pub fn new(code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            status: StationStatus::Available,
            revision: 0,
            hold: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an admission may take the hold at `now`.
    pub fn hold_is_free_at(&self, now: DateTime<Utc>) -> bool {
        self.hold.as_ref().map_or(true, |h| !h.is_live_at(now))
    }
}
