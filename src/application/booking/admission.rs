//! Admission controller: turns a booking request into a `Booked` reservation
//!
//! Admissions on one station are serialised by the station hold, a
//! conditional update on the station record. Only the holder runs the
//! availability check and writes the reservation. The hold is a lease, so
//! the write is fenced: the hold is renewed right before it, the overlap
//! check is repeated right after it, and a reservation whose hold was lost
//! by release time is withdrawn again.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::availability::AvailabilityChecker;
use super::hold::StationHold;
use super::lifecycle::LifecycleManager;
use super::pin::{unique_pin, PinGenerator};
use crate::domain::reservation::{Reservation, TimeWindow};
use crate::domain::station::{Station, StationStatus};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::clock::SharedClock;

pub struct AdmissionController {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    checker: AvailabilityChecker,
    lifecycle: Arc<LifecycleManager>,
    pins: Arc<dyn PinGenerator>,
}

impl AdmissionController {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        lifecycle: Arc<LifecycleManager>,
        pins: Arc<dyn PinGenerator>,
    ) -> Self {
        Self {
            checker: AvailabilityChecker::new(repos.clone()),
            repos,
            clock,
            lifecycle,
            pins,
        }
    }

    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    pub async fn create_reservation(
        &self,
        user_id: &str,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let window = TimeWindow::new(start, end)?;

        let station = self
            .repos
            .stations()
            .find_by_id(station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", station_id))?;

        if station.status == StationStatus::InUse {
            return Err(DomainError::ResourceUnavailable(station.id));
        }

        let holds = self.lifecycle.holds();
        let hold = holds.acquire(&station.id).await?;

        let result = self.admit_held(&station, &hold, user_id, window).await;

        let still_held = match holds.release(&hold).await {
            Ok(released) => released,
            Err(e) => {
                warn!(station_id = %station.id, error = %e, "Failed to release admission hold");
                true
            }
        };

        match result {
            Ok(reservation) if !still_held => {
                self.lifecycle.withdraw(&reservation).await?;
                Err(DomainError::ConcurrencyConflict(format!(
                    "admission hold on station {} expired before the booking completed",
                    station.id
                )))
            }
            other => other,
        }
    }

    /// Runs while this admission owns the station hold.
    async fn admit_held(
        &self,
        station: &Station,
        hold: &StationHold,
        user_id: &str,
        window: TimeWindow,
    ) -> DomainResult<Reservation> {
        let active = self.checker.active_reservations(&station.id).await?;
        let availability = AvailabilityChecker::evaluate(&active, &window);
        if !availability.available {
            return Err(DomainError::WindowConflict {
                station_id: station.id.clone(),
                conflicts: availability.conflicts.into_iter().map(|r| r.id).collect(),
            });
        }

        let taken: HashSet<&str> = active.iter().map(|r| r.pin.as_str()).collect();
        let pin = unique_pin(self.pins.as_ref(), &taken)?;

        let reservation = Reservation::new(&station.id, user_id, window, pin, self.clock.now());
        self.lifecycle.holds().fence(hold).await?;
        self.repos.reservations().create(reservation.clone()).await?;
        debug!(reservation_id = %reservation.id, station_id = %station.id, "Reservation written");

        self.confirm_sole_claim(&reservation).await?;

        if let Err(e) = self.lifecycle.sync_station_status(&station.id).await {
            warn!(station_id = %station.id, error = %e, "Station status sync after admission failed");
        }

        Ok(reservation)
    }

    /// After the write: if an overlapping active reservation appeared
    /// anyway, withdraw ours and report a retryable conflict.
    pub(crate) async fn confirm_sole_claim(&self, reservation: &Reservation) -> DomainResult<()> {
        let window = reservation.window();
        let rivals: Vec<String> = self
            .checker
            .active_reservations(&reservation.station_id)
            .await?
            .into_iter()
            .filter(|r| r.id != reservation.id && r.window().overlaps(&window))
            .map(|r| r.id)
            .collect();
        if rivals.is_empty() {
            return Ok(());
        }

        warn!(
            reservation_id = %reservation.id,
            station_id = %reservation.station_id,
            rivals = ?rivals,
            "Overlapping reservation written concurrently"
        );
        self.lifecycle.withdraw(reservation).await?;
        Err(DomainError::ConcurrencyConflict(format!(
            "reservation {} raced {} overlapping reservation(s) on station {}",
            reservation.id,
            rivals.len(),
            reservation.station_id
        )))
    }
}
