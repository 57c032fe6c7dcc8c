//! Arrival confirmation: PIN plus time-window check before `Booked -> InUse`

use std::sync::Arc;

use tracing::info;

use super::lifecycle::LifecycleManager;
use crate::domain::reservation::{Reservation, ReservationStatus, Trigger};
use crate::domain::{Actor, DomainError, DomainResult};
use crate::shared::clock::SharedClock;

pub struct ArrivalGate {
    lifecycle: Arc<LifecycleManager>,
    clock: SharedClock,
}

impl ArrivalGate {
    pub fn new(lifecycle: Arc<LifecycleManager>, clock: SharedClock) -> Self {
        Self { lifecycle, clock }
    }

    pub async fn confirm_arrival(
        &self,
        reservation_id: &str,
        pin: &str,
        actor: &Actor,
    ) -> DomainResult<Reservation> {
        let reservation = self.lifecycle.load(reservation_id).await?;

        if reservation.status != ReservationStatus::Booked {
            return Err(DomainError::InvalidTransition {
                from: reservation.status,
                trigger: Trigger::ConfirmArrival,
            });
        }

        if !(actor.owns(&reservation.user_id) || actor.is_admin()) {
            return Err(DomainError::Forbidden(format!(
                "{} may not confirm arrival for reservation {}",
                actor.describe(),
                reservation.id
            )));
        }

        if reservation.pin != pin {
            return Err(DomainError::PinMismatch(reservation.id));
        }

        let now = self.clock.now();
        if !reservation.window().admits_arrival_at(now) {
            return Err(DomainError::OutOfWindow(reservation.id));
        }

        let confirmed = self
            .lifecycle
            .transition(reservation, Trigger::ConfirmArrival, actor, Some(true))
            .await?;
        info!(reservation_id = %confirmed.id, station_id = %confirmed.station_id, "Arrival confirmed");
        Ok(confirmed)
    }
}
