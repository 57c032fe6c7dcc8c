//! Reservation lifecycle manager
//!
//! The only place that changes a reservation's status or a station's
//! status. Every write is a conditional update:
//!
//! - reservations move only if their stored status still equals the state
//!   the transition was computed from;
//! - moves into `InUse` additionally run under the station hold, so the
//!   "one `InUse` per station" check and the write cannot interleave with
//!   another move into `InUse` on the same station;
//! - station status is re-derived from the active reservations and written
//!   conditionally on `(status, revision)`, retrying when a concurrent
//!   writer got there first.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use super::hold::{StationHold, StationHolds, DEFAULT_HOLD_TTL_SECS};
use crate::domain::reservation::{
    transition_target, Reservation, ReservationPatch, ReservationStatus, Trigger,
};
use crate::domain::station::StationStatus;
use crate::domain::{Actor, DomainError, DomainResult, RepositoryProvider};
use crate::shared::clock::SharedClock;

const STATION_SYNC_ATTEMPTS: usize = 5;

pub struct LifecycleManager {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    holds: StationHolds,
}

impl LifecycleManager {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self {
            holds: StationHolds::new(
                repos.clone(),
                clock.clone(),
                Duration::seconds(DEFAULT_HOLD_TTL_SECS),
            ),
            repos,
            clock,
        }
    }

    pub fn with_hold_ttl(mut self, ttl: Duration) -> Self {
        self.holds = StationHolds::new(self.repos.clone(), self.clock.clone(), ttl);
        self
    }

    /// Station holds shared with admission.
    pub fn holds(&self) -> &StationHolds {
        &self.holds
    }

    pub async fn load(&self, reservation_id: &str) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", reservation_id))
    }

    /// Load the reservation and drive `trigger` through the state machine.
    pub async fn apply(
        &self,
        reservation_id: &str,
        trigger: Trigger,
        actor: &Actor,
    ) -> DomainResult<Reservation> {
        let reservation = self.load(reservation_id).await?;
        self.transition(reservation, trigger, actor, None).await
    }

    /// Drive `trigger` from the state recorded in `reservation`.
    ///
    /// Fails with `ConcurrencyConflict` if the stored status moved on since
    /// `reservation` was read, or if another change holds the station while
    /// moving into `InUse`; nothing is written in either case.
    pub async fn transition(
        &self,
        reservation: Reservation,
        trigger: Trigger,
        actor: &Actor,
        arrived: Option<bool>,
    ) -> DomainResult<Reservation> {
        let now = self.clock.now();
        let from = reservation.status;
        let target = transition_target(from, trigger)
            .ok_or(DomainError::InvalidTransition { from, trigger })?;

        authorize(&reservation, trigger, actor)?;

        if trigger == Trigger::ExpirationSweep && !reservation.is_expired_at(now) {
            return Err(DomainError::InvalidTransition { from, trigger });
        }

        let mut patch = ReservationPatch::status(target, now);
        if let Some(arrived) = arrived {
            patch = patch.with_arrived(arrived);
        }

        let updated = if target == ReservationStatus::InUse {
            let hold = self.holds.acquire(&reservation.station_id).await?;
            let result = self.occupy(reservation, &patch, &hold).await;
            if let Err(e) = self.holds.release(&hold).await {
                warn!(station_id = %hold.station_id, error = %e, "Failed to release station hold");
            }
            result?
        } else {
            self.write(reservation, &patch).await?
        };

        info!(
            reservation_id = %updated.id,
            station_id = %updated.station_id,
            %trigger,
            %from,
            to = %target,
            actor = %actor.describe(),
            "Reservation transitioned"
        );
        metrics::counter!("booking_transitions_total", "trigger" => trigger.as_str()).increment(1);

        if let Err(e) = self.sync_station_status(&updated.station_id).await {
            // The reservation write stands; the sweeper's reconcile pass repairs the station.
            warn!(station_id = %updated.station_id, error = %e, "Station status sync failed");
        }

        Ok(updated)
    }

    /// Cancel a `Booked` reservation that admission wrote but could not
    /// stand behind. No authorization: only admission calls this, for its
    /// own write. Returns whether the reservation was withdrawn.
    pub async fn withdraw(&self, reservation: &Reservation) -> DomainResult<bool> {
        let patch = ReservationPatch::status(ReservationStatus::Cancel, self.clock.now());
        let withdrawn = self
            .repos
            .reservations()
            .conditional_update(&reservation.id, ReservationStatus::Booked, patch)
            .await?;
        if withdrawn {
            warn!(
                reservation_id = %reservation.id,
                station_id = %reservation.station_id,
                "Reservation withdrawn after a lost admission race"
            );
        }
        if let Err(e) = self.sync_station_status(&reservation.station_id).await {
            warn!(station_id = %reservation.station_id, error = %e, "Station status sync failed");
        }
        Ok(withdrawn)
    }

    /// Move into `InUse` while holding the station.
    async fn occupy(
        &self,
        reservation: Reservation,
        patch: &ReservationPatch,
        hold: &StationHold,
    ) -> DomainResult<Reservation> {
        self.ensure_station_not_occupied(&reservation).await?;
        self.holds.fence(hold).await?;
        self.write(reservation, patch).await
    }

    async fn write(
        &self,
        reservation: Reservation,
        patch: &ReservationPatch,
    ) -> DomainResult<Reservation> {
        let applied = self
            .repos
            .reservations()
            .conditional_update(&reservation.id, reservation.status, patch.clone())
            .await?;
        if !applied {
            return Err(DomainError::ConcurrencyConflict(format!(
                "reservation {} changed while moving to {}",
                reservation.id, patch.status
            )));
        }

        let mut updated = reservation;
        updated.apply(patch);
        Ok(updated)
    }

    /// Re-derive the station status from its active reservations and
    /// store it. Always writes, so a concurrent sync that read older
    /// reservations loses its revision check.
    pub async fn sync_station_status(&self, station_id: &str) -> DomainResult<StationStatus> {
        self.write_derived_status(station_id, true).await
    }

    /// Correct stations whose stored status disagrees with their
    /// reservations. Returns how many were rewritten.
    pub async fn reconcile_stations(&self) -> DomainResult<usize> {
        let mut corrected = 0;
        for station in self.repos.stations().find_all().await? {
            let before = station.status;
            match self.write_derived_status(&station.id, false).await {
                Ok(after) if after != before => {
                    info!(station_id = %station.id, %before, %after, "Station status reconciled");
                    corrected += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(station_id = %station.id, error = %e, "Station reconcile failed"),
            }
        }
        Ok(corrected)
    }

    async fn write_derived_status(
        &self,
        station_id: &str,
        always_write: bool,
    ) -> DomainResult<StationStatus> {
        for attempt in 1..=STATION_SYNC_ATTEMPTS {
            // Station first, reservations second: a writer that lands in
            // between bumps the revision and fails our update below.
            let station = self
                .repos
                .stations()
                .find_by_id(station_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Station", station_id))?;
            let active = self
                .repos
                .reservations()
                .find_active(station_id, &ReservationStatus::TERMINAL)
                .await?;
            let desired = StationStatus::derive(&active);

            if !always_write && station.status == desired {
                return Ok(desired);
            }

            if self
                .repos
                .stations()
                .conditional_update_status(
                    station_id,
                    station.status,
                    station.revision,
                    desired,
                    self.clock.now(),
                )
                .await?
            {
                debug!(%station_id, from = %station.status, to = %desired, "Station status written");
                return Ok(desired);
            }

            debug!(%station_id, attempt, "Station changed during sync, retrying");
        }

        Err(DomainError::ConcurrencyConflict(format!(
            "station {} kept changing during status sync",
            station_id
        )))
    }

    /// Only one reservation per station may be `InUse`.
    async fn ensure_station_not_occupied(&self, reservation: &Reservation) -> DomainResult<()> {
        let active = self
            .repos
            .reservations()
            .find_active(&reservation.station_id, &ReservationStatus::TERMINAL)
            .await?;
        if active
            .iter()
            .any(|r| r.status == ReservationStatus::InUse && r.id != reservation.id)
        {
            return Err(DomainError::ResourceUnavailable(reservation.station_id.clone()));
        }
        Ok(())
    }
}

fn authorize(reservation: &Reservation, trigger: Trigger, actor: &Actor) -> DomainResult<()> {
    let owner = actor.owns(&reservation.user_id);
    let allowed = match trigger {
        Trigger::ConfirmArrival | Trigger::UserCancel => owner || actor.is_admin(),
        Trigger::UserComplete => owner,
        Trigger::AdminAccept | Trigger::AdminCancel => actor.is_admin(),
        Trigger::ExpirationSweep => *actor == Actor::System,
    };

    if allowed {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "{} may not apply {} to reservation {}",
            actor.describe(),
            trigger,
            reservation.id
        )))
    }
}
