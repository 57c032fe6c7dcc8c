//! Overlap detection for time-window booking

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::reservation::{Reservation, ReservationStatus, TimeWindow};
use crate::domain::{DomainResult, RepositoryProvider};

/// Outcome of an availability check. `conflicts` is kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Reservation>,
}

pub struct AvailabilityChecker {
    repos: Arc<dyn RepositoryProvider>,
}

impl AvailabilityChecker {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    pub async fn check(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Availability> {
        let window = TimeWindow::new(start, end)?;
        let active = self.active_reservations(station_id).await?;
        Ok(Self::evaluate(&active, &window))
    }

    /// Reservations on the station that are `Booked` or `InUse`.
    pub async fn active_reservations(&self, station_id: &str) -> DomainResult<Vec<Reservation>> {
        self.repos
            .reservations()
            .find_active(station_id, &ReservationStatus::TERMINAL)
            .await
    }

    pub fn evaluate(existing: &[Reservation], window: &TimeWindow) -> Availability {
        let conflicts: Vec<Reservation> = existing
            .iter()
            .filter(|r| r.is_active() && r.window().overlaps(window))
            .cloned()
            .collect();

        Availability {
            available: conflicts.is_empty(),
            conflicts,
        }
    }
}
