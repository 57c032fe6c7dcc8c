//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Reservation, ReservationPatch, ReservationStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a new reservation, returning its id
    async fn create(&self, reservation: Reservation) -> DomainResult<String>;

    /// Find reservation by ID
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>>;

    /// Reservations on a station whose status is not in `exclude`
    async fn find_active(
        &self,
        station_id: &str,
        exclude: &[ReservationStatus],
    ) -> DomainResult<Vec<Reservation>>;

    /// Apply `patch` only if the stored status still equals `expected`.
    /// Returns `false` when the precondition no longer holds.
    async fn conditional_update(
        &self,
        id: &str,
        expected: ReservationStatus,
        patch: ReservationPatch,
    ) -> DomainResult<bool>;

    /// `Booked` reservations whose expiration time is before `now`
    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    /// All reservations of a user, newest first
    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>>;

    /// All reservations (any status), newest first
    async fn find_all(&self) -> DomainResult<Vec<Reservation>>;
}
