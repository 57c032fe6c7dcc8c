//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::reservation::{Reservation, ReservationStatus};

/// Request to book a station for a time window
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub station_id: String,
    /// Window start (RFC 3339)
    pub start_time: DateTime<Utc>,
    /// Window end (RFC 3339), exclusive
    pub end_time: DateTime<Utc>,
}

/// Arrival confirmation with the PIN issued at booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmArrivalRequest {
    /// Compared with the issued code as-is; any other value is a PIN mismatch
    pub pin: String,
}

/// Reservation details in API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub station_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Arrival deadline: start time plus the grace period
    pub expiration_time: DateTime<Utc>,
    pub pin: String,
    pub arrived: bool,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            station_id: r.station_id,
            user_id: r.user_id,
            start_time: r.start_time,
            end_time: r.end_time,
            expiration_time: r.expiration_time,
            pin: r.pin,
            arrived: r.arrived,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
