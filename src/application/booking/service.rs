//! Booking service
//!
//! Application facade used by the HTTP handlers: the six reservation
//! operations plus read access and station registration. Each operation
//! takes the calling [`Actor`] explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::admission::AdmissionController;
use super::arrival::ArrivalGate;
use super::availability::Availability;
use super::lifecycle::LifecycleManager;
use super::pin::{PinGenerator, RandomPinGenerator};
use crate::domain::reservation::{Reservation, Trigger};
use crate::domain::station::Station;
use crate::domain::{Actor, DomainError, DomainResult, RepositoryProvider};
use crate::shared::clock::SharedClock;
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Tunables for admission
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// How long an admission may hold a station before others can take over
    pub hold_ttl: Duration,
    /// Re-runs after a `ConcurrencyConflict`, for admissions and for moves
    /// into `InUse`
    pub retry: RetryConfig,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::seconds(15),
            retry: RetryConfig::default(),
        }
    }
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    lifecycle: Arc<LifecycleManager>,
    admission: AdmissionController,
    arrival: ArrivalGate,
    retry: RetryConfig,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        settings: BookingSettings,
    ) -> Self {
        Self::with_pin_generator(repos, clock, Arc::new(RandomPinGenerator), settings)
    }

    pub fn with_pin_generator(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        pins: Arc<dyn PinGenerator>,
        settings: BookingSettings,
    ) -> Self {
        let lifecycle = Arc::new(
            LifecycleManager::new(repos.clone(), clock.clone()).with_hold_ttl(settings.hold_ttl),
        );
        let admission =
            AdmissionController::new(repos.clone(), clock.clone(), lifecycle.clone(), pins);
        let arrival = ArrivalGate::new(lifecycle.clone(), clock.clone());

        Self {
            repos,
            clock,
            lifecycle,
            admission,
            arrival,
            retry: settings.retry,
        }
    }

    /// Shared with the expiration sweeper.
    pub fn lifecycle(&self) -> Arc<LifecycleManager> {
        self.lifecycle.clone()
    }

    // ── Reservation operations ────────────────────────────────

    pub async fn create_reservation(
        &self,
        actor: &Actor,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let user_id = actor.user_id().ok_or_else(|| {
            DomainError::Forbidden(format!("{} may not create reservations", actor.describe()))
        })?;

        let result = retry_with_backoff(
            &self.retry,
            || self.admission.create_reservation(user_id, station_id, start, end),
            DomainError::is_retryable,
            "create_reservation",
        )
        .await;

        match &result {
            Ok(reservation) => {
                metrics::counter!("booking_reservations_created_total").increment(1);
                info!(
                    reservation_id = %reservation.id,
                    station_id = %reservation.station_id,
                    user_id = %reservation.user_id,
                    start = %reservation.start_time,
                    end = %reservation.end_time,
                    "Reservation created"
                );
            }
            Err(e) => {
                metrics::counter!("booking_admission_rejected_total", "reason" => e.code())
                    .increment(1);
                info!(%station_id, %user_id, code = e.code(), "Reservation rejected: {}", e);
            }
        }

        result
    }

    pub async fn confirm_arrival(
        &self,
        actor: &Actor,
        reservation_id: &str,
        pin: &str,
    ) -> DomainResult<Reservation> {
        retry_with_backoff(
            &self.retry,
            || self.arrival.confirm_arrival(reservation_id, pin, actor),
            DomainError::is_retryable,
            "confirm_arrival",
        )
        .await
    }

    pub async fn complete_reservation(
        &self,
        actor: &Actor,
        reservation_id: &str,
    ) -> DomainResult<Reservation> {
        self.lifecycle
            .apply(reservation_id, Trigger::UserComplete, actor)
            .await
    }

    pub async fn cancel_reservation(
        &self,
        actor: &Actor,
        reservation_id: &str,
    ) -> DomainResult<Reservation> {
        self.lifecycle
            .apply(reservation_id, Trigger::UserCancel, actor)
            .await
    }

    pub async fn admin_accept_booking(
        &self,
        actor: &Actor,
        reservation_id: &str,
    ) -> DomainResult<Reservation> {
        retry_with_backoff(
            &self.retry,
            || self.lifecycle.apply(reservation_id, Trigger::AdminAccept, actor),
            DomainError::is_retryable,
            "admin_accept_booking",
        )
        .await
    }

    pub async fn admin_cancel_booking(
        &self,
        actor: &Actor,
        reservation_id: &str,
    ) -> DomainResult<Reservation> {
        self.lifecycle
            .apply(reservation_id, Trigger::AdminCancel, actor)
            .await
    }

    // ── Queries ───────────────────────────────────────────────

    pub async fn get_reservation(
        &self,
        actor: &Actor,
        reservation_id: &str,
    ) -> DomainResult<Reservation> {
        let reservation = self.lifecycle.load(reservation_id).await?;
        if actor.owns(&reservation.user_id) || actor.is_admin() {
            Ok(reservation)
        } else {
            Err(DomainError::Forbidden(format!(
                "{} may not view reservation {}",
                actor.describe(),
                reservation_id
            )))
        }
    }

    /// Admins see every reservation, users only their own.
    pub async fn list_reservations(&self, actor: &Actor) -> DomainResult<Vec<Reservation>> {
        match actor {
            Actor::User(user_id) => self.repos.reservations().find_by_user(user_id).await,
            Actor::Admin(_) | Actor::System => self.repos.reservations().find_all().await,
        }
    }

    pub async fn check_availability(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Availability> {
        self.get_station(station_id).await?;
        self.admission.checker().check(station_id, start, end).await
    }

    // ── Stations ──────────────────────────────────────────────

    pub async fn register_station(&self, actor: &Actor, code: &str) -> DomainResult<Station> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden(format!(
                "{} may not register stations",
                actor.describe()
            )));
        }

        let code = code.trim();
        if code.is_empty() {
            return Err(DomainError::Validation("station code must not be empty".into()));
        }
        let existing = self.repos.stations().find_all().await?;
        if existing.iter().any(|s| s.code == code) {
            warn!(%code, "Station code already registered");
            return Err(DomainError::Validation(format!(
                "station code {} is already registered",
                code
            )));
        }

        let station = Station::new(code, self.clock.now());
        self.repos.stations().save(station.clone()).await?;
        info!(station_id = %station.id, %code, "Station registered");
        Ok(station)
    }

    pub async fn get_station(&self, station_id: &str) -> DomainResult<Station> {
        self.repos
            .stations()
            .find_by_id(station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", station_id))
    }

    pub async fn list_stations(&self) -> DomainResult<Vec<Station>> {
        self.repos.stations().find_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::ReservationStatus;
    use crate::domain::station::StationStatus;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::shared::clock::ManualClock;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    fn settings() -> BookingSettings {
        BookingSettings {
            hold_ttl: Duration::seconds(15),
            retry: RetryConfig {
                initial_delay: std::time::Duration::from_millis(1),
                ..RetryConfig::default()
            },
        }
    }

    fn admin() -> Actor {
        Actor::Admin("ops".into())
    }

    fn user(id: &str) -> Actor {
        Actor::User(id.into())
    }

    async fn service_with_station() -> (Arc<BookingService>, Arc<ManualClock>, String) {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let clock = Arc::new(ManualClock::new(at(8, 0)));
        let service = Arc::new(BookingService::new(repos, clock.clone(), settings()));
        let station = service.register_station(&admin(), "CP-1").await.unwrap();
        (service, clock, station.id)
    }

    #[tokio::test]
    async fn touching_windows_both_succeed() {
        let (service, _, station_id) = service_with_station().await;
        let alice = user("alice");

        let a = service
            .create_reservation(&alice, &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap();
        let b = service
            .create_reservation(&alice, &station_id, at(11, 0), at(12, 0))
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.pin, b.pin);
        let station = service.get_station(&station_id).await.unwrap();
        assert_eq!(station.status, StationStatus::Booked);
    }

    #[tokio::test]
    async fn overlapping_request_is_rejected() {
        let (service, _, station_id) = service_with_station().await;
        service
            .create_reservation(&user("alice"), &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap();

        let err = service
            .create_reservation(&user("bob"), &station_id, at(10, 30), at(10, 45))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "WINDOW_CONFLICT");

        let availability = service
            .check_availability(&station_id, at(10, 30), at(10, 45))
            .await
            .unwrap();
        assert!(!availability.available);
    }

    #[tokio::test]
    async fn system_actor_cannot_book() {
        let (service, _, station_id) = service_with_station().await;
        let err = service
            .create_reservation(&Actor::System, &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");
    }

    #[tokio::test]
    async fn full_lifecycle_releases_station() {
        let (service, clock, station_id) = service_with_station().await;
        let alice = user("alice");
        let r = service
            .create_reservation(&alice, &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap();

        clock.set(at(10, 10));
        let r = service.confirm_arrival(&alice, &r.id, &r.pin).await.unwrap();
        assert_eq!(r.status, ReservationStatus::InUse);
        assert_eq!(
            service.get_station(&station_id).await.unwrap().status,
            StationStatus::InUse
        );

        let err = service
            .create_reservation(&user("bob"), &station_id, at(12, 0), at(13, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RESOURCE_UNAVAILABLE");

        let r = service.complete_reservation(&alice, &r.id).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Completed);
        assert_eq!(
            service.get_station(&station_id).await.unwrap().status,
            StationStatus::Available
        );
    }

    #[tokio::test]
    async fn admin_operations_require_admin() {
        let (service, _, station_id) = service_with_station().await;
        let alice = user("alice");
        let r = service
            .create_reservation(&alice, &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap();

        let err = service.admin_accept_booking(&alice, &r.id).await.unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");

        let r = service.admin_accept_booking(&admin(), &r.id).await.unwrap();
        assert_eq!(r.status, ReservationStatus::InUse);

        let err = service.cancel_reservation(&alice, &r.id).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");

        let r = service.admin_cancel_booking(&admin(), &r.id).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Cancel);
    }

    #[tokio::test]
    async fn reads_are_scoped_to_owner() {
        let (service, _, station_id) = service_with_station().await;
        let r = service
            .create_reservation(&user("alice"), &station_id, at(10, 0), at(11, 0))
            .await
            .unwrap();
        service
            .create_reservation(&user("bob"), &station_id, at(12, 0), at(13, 0))
            .await
            .unwrap();

        assert!(service.get_reservation(&user("alice"), &r.id).await.is_ok());
        assert!(service.get_reservation(&admin(), &r.id).await.is_ok());
        let err = service
            .get_reservation(&user("bob"), &r.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");

        assert_eq!(service.list_reservations(&user("alice")).await.unwrap().len(), 1);
        assert_eq!(service.list_reservations(&admin()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn station_registration_is_admin_only_and_unique() {
        let (service, _, _) = service_with_station().await;

        let err = service
            .register_station(&user("alice"), "CP-2")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");

        let err = service.register_station(&admin(), "CP-1").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = service.register_station(&admin(), "  ").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        service.register_station(&admin(), "CP-2").await.unwrap();
        let codes: Vec<String> = service
            .list_stations()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, vec!["CP-1", "CP-2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_overlapping_creates_admit_exactly_one() {
        let (service, _, station_id) = service_with_station().await;

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let service = service.clone();
            let station_id = station_id.clone();
            handles.push(tokio::spawn(async move {
                let actor = Actor::User(format!("user-{i}"));
                service
                    .create_reservation(&actor, &station_id, at(10, 0), at(11, 0) + Duration::minutes(i as i64))
                    .await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(e) => assert!(
                    matches!(
                        e.code(),
                        "WINDOW_CONFLICT" | "CONCURRENCY_CONFLICT" | "RESOURCE_UNAVAILABLE"
                    ),
                    "unexpected error {e:?}"
                ),
            }
        }
        assert_eq!(admitted, 1);

        let active: Vec<Reservation> = service
            .list_reservations(&admin())
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_leave_overlaps() {
        let (service, _, station_id) = service_with_station().await;

        // Half-hour slots offset by 15 minutes: neighbours overlap.
        let mut handles = Vec::new();
        for i in 0..12i64 {
            let service = service.clone();
            let station_id = station_id.clone();
            handles.push(tokio::spawn(async move {
                let start = at(9, 0) + Duration::minutes(15 * i);
                service
                    .create_reservation(&Actor::User(format!("u{i}")), &station_id, start, start + Duration::minutes(30))
                    .await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let active: Vec<Reservation> = service
            .list_reservations(&admin())
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_active())
            .collect();
        assert!(!active.is_empty());
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                assert!(
                    !a.window().overlaps(&b.window()),
                    "{} and {} overlap",
                    a.id,
                    b.id
                );
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_admin_accepts_put_one_reservation_in_use() {
        for _ in 0..20 {
            let (service, _, station_id) = service_with_station().await;
            let a = service
                .create_reservation(&user("alice"), &station_id, at(10, 0), at(11, 0))
                .await
                .unwrap();
            let b = service
                .create_reservation(&user("bob"), &station_id, at(11, 0), at(12, 0))
                .await
                .unwrap();

            let tasks: Vec<_> = [a.id, b.id]
                .into_iter()
                .map(|id| {
                    let service = service.clone();
                    tokio::spawn(async move { service.admin_accept_booking(&admin(), &id).await })
                })
                .collect();

            let mut accepted = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(r) => {
                        assert_eq!(r.status, ReservationStatus::InUse);
                        accepted += 1;
                    }
                    Err(e) => assert!(
                        matches!(e.code(), "RESOURCE_UNAVAILABLE" | "CONCURRENCY_CONFLICT"),
                        "unexpected error {e:?}"
                    ),
                }
            }
            assert_eq!(accepted, 1);

            let in_use = service
                .list_reservations(&admin())
                .await
                .unwrap()
                .into_iter()
                .filter(|r| r.status == ReservationStatus::InUse)
                .count();
            assert_eq!(in_use, 1);
            assert_eq!(
                service.get_station(&station_id).await.unwrap().status,
                StationStatus::InUse
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn arrivals_at_the_shared_boundary_put_one_reservation_in_use() {
        for _ in 0..20 {
            let (service, clock, station_id) = service_with_station().await;
            let a = service
                .create_reservation(&user("alice"), &station_id, at(10, 0), at(11, 0))
                .await
                .unwrap();
            let b = service
                .create_reservation(&user("bob"), &station_id, at(11, 0), at(12, 0))
                .await
                .unwrap();
            // 11:00 is inside both closed arrival windows
            clock.set(at(11, 0));

            let tasks: Vec<_> = [("alice", a), ("bob", b)]
                .into_iter()
                .map(|(owner, r)| {
                    let service = service.clone();
                    tokio::spawn(async move {
                        service.confirm_arrival(&user(owner), &r.id, &r.pin).await
                    })
                })
                .collect();

            let mut confirmed = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(_) => confirmed += 1,
                    Err(e) => assert!(
                        matches!(e.code(), "RESOURCE_UNAVAILABLE" | "CONCURRENCY_CONFLICT"),
                        "unexpected error {e:?}"
                    ),
                }
            }
            assert_eq!(confirmed, 1);
            assert_eq!(
                service.get_station(&station_id).await.unwrap().status,
                StationStatus::InUse
            );
        }
    }
}
