//! Station DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::Availability;
use crate::domain::station::{Station, StationStatus};

/// Request to register a station
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStationRequest {
    /// Label printed on the unit, unique
    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StationDto {
    pub id: String,
    pub code: String,
    pub status: StationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Station> for StationDto {
    fn from(s: Station) -> Self {
        Self {
            id: s.id,
            code: s.code,
            status: s.status,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Window to check, as query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// Window start (RFC 3339)
    pub start: DateTime<Utc>,
    /// Window end (RFC 3339), exclusive
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityDto {
    pub available: bool,
    /// Ids of the active reservations overlapping the window
    pub conflicts: Vec<String>,
}

impl From<Availability> for AvailabilityDto {
    fn from(a: Availability) -> Self {
        Self {
            available: a.available,
            conflicts: a.conflicts.into_iter().map(|r| r.id).collect(),
        }
    }
}
