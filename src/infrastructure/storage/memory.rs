//! In-memory storage implementation
//!
//! Conditional updates run under the DashMap shard write lock held by
//! `get_mut`, which makes each compare-and-set atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::{
    Reservation, ReservationPatch, ReservationRepository, ReservationStatus,
};
use crate::domain::station::{AdmissionHold, Station, StationRepository, StationStatus};
use crate::domain::{DomainError, DomainResult};

/// In-memory station store
#[derive(Default)]
pub struct InMemoryStationRepository {
    stations: DashMap<String, Station>,
}

#[async_trait]
impl StationRepository for InMemoryStationRepository {
    async fn save(&self, station: Station) -> DomainResult<()> {
        if self.stations.contains_key(&station.id) {
            return Err(DomainError::Validation(format!(
                "station {} already exists",
                station.id
            )));
        }
        self.stations.insert(station.id.clone(), station);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(id).map(|s| s.clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<Station>> {
        let mut all: Vec<Station> = self.stations.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(all)
    }

    async fn conditional_update_status(
        &self,
        id: &str,
        expected_status: StationStatus,
        expected_revision: i64,
        new_status: StationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(mut station) = self.stations.get_mut(id) else {
            return Ok(false);
        };
        if station.status != expected_status || station.revision != expected_revision {
            return Ok(false);
        }
        station.status = new_status;
        station.revision += 1;
        station.updated_at = now;
        Ok(true)
    }

    async fn try_acquire_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(mut station) = self.stations.get_mut(id) else {
            return Ok(false);
        };
        if !station.hold_is_free_at(now) {
            return Ok(false);
        }
        station.hold = Some(AdmissionHold {
            token: token.to_string(),
            expires_at,
        });
        Ok(true)
    }

    async fn renew_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(mut station) = self.stations.get_mut(id) else {
            return Ok(false);
        };
        match station.hold.as_mut() {
            Some(hold) if hold.token == token && hold.is_live_at(now) => {
                hold.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_hold(&self, id: &str, token: &str) -> DomainResult<bool> {
        let Some(mut station) = self.stations.get_mut(id) else {
            return Ok(false);
        };
        let owned = station.hold.as_ref().is_some_and(|h| h.token == token);
        if owned {
            station.hold = None;
        }
        Ok(owned)
    }
}

/// In-memory reservation store
#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: DashMap<String, Reservation>,
}

impl InMemoryReservationRepository {
    fn collect_sorted(&self, pred: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn create(&self, reservation: Reservation) -> DomainResult<String> {
        let id = reservation.id.clone();
        if self.reservations.contains_key(&id) {
            return Err(DomainError::Validation(format!(
                "reservation {} already exists",
                id
            )));
        }
        self.reservations.insert(id.clone(), reservation);
        Ok(id)
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(id).map(|r| r.clone()))
    }

    async fn find_active(
        &self,
        station_id: &str,
        exclude: &[ReservationStatus],
    ) -> DomainResult<Vec<Reservation>> {
        let mut found =
            self.collect_sorted(|r| r.station_id == station_id && !exclude.contains(&r.status));
        found.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(found)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: ReservationStatus,
        patch: ReservationPatch,
    ) -> DomainResult<bool> {
        let Some(mut reservation) = self.reservations.get_mut(id) else {
            return Ok(false);
        };
        if reservation.status != expected {
            return Ok(false);
        }
        reservation.apply(&patch);
        Ok(true)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect_sorted(|r| {
            r.status == ReservationStatus::Booked && r.expiration_time < now
        }))
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect_sorted(|r| r.user_id == user_id))
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        Ok(self.collect_sorted(|_| true))
    }
}

/// Repository provider for tests and the `memory` storage backend
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    stations: InMemoryStationRepository,
    reservations: InMemoryReservationRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn stations(&self) -> &dyn StationRepository {
        &self.stations
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::TimeWindow;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn station_status_update_checks_status_and_revision() {
        let repo = InMemoryStationRepository::default();
        let station = Station::new("CP-1", at(8));
        let id = station.id.clone();
        repo.save(station).await.unwrap();

        assert!(repo
            .conditional_update_status(&id, StationStatus::Available, 0, StationStatus::Booked, at(9))
            .await
            .unwrap());
        // stale revision
        assert!(!repo
            .conditional_update_status(&id, StationStatus::Booked, 0, StationStatus::Available, at(9))
            .await
            .unwrap());
        // stale status
        assert!(!repo
            .conditional_update_status(&id, StationStatus::Available, 1, StationStatus::InUse, at(9))
            .await
            .unwrap());

        let stored = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, StationStatus::Booked);
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.updated_at, at(9));
    }

    #[tokio::test]
    async fn hold_is_exclusive_until_released_or_expired() {
        let repo = InMemoryStationRepository::default();
        let station = Station::new("CP-1", at(8));
        let id = station.id.clone();
        repo.save(station).await.unwrap();

        let ttl = Duration::seconds(15);
        assert!(repo.try_acquire_hold(&id, "a", at(8), at(8) + ttl).await.unwrap());
        assert!(!repo.try_acquire_hold(&id, "b", at(8), at(8) + ttl).await.unwrap());
        assert!(!repo.release_hold(&id, "b").await.unwrap());
        assert!(repo.release_hold(&id, "a").await.unwrap());
        assert!(repo.try_acquire_hold(&id, "b", at(8), at(8) + ttl).await.unwrap());

        // "b" never released; after the TTL someone else may take over
        let later = at(8) + Duration::seconds(16);
        assert!(!repo.renew_hold(&id, "b", later, later + ttl).await.unwrap());
        assert!(repo.try_acquire_hold(&id, "c", later, later + ttl).await.unwrap());
        assert!(!repo.renew_hold(&id, "b", later, later + ttl).await.unwrap());
    }

    #[tokio::test]
    async fn renewal_extends_only_a_live_hold_of_the_same_owner() {
        let repo = InMemoryStationRepository::default();
        let station = Station::new("CP-1", at(8));
        let id = station.id.clone();
        repo.save(station).await.unwrap();

        let ttl = Duration::seconds(15);
        assert!(repo.try_acquire_hold(&id, "a", at(8), at(8) + ttl).await.unwrap());
        let t = at(8) + Duration::seconds(10);
        assert!(repo.renew_hold(&id, "a", t, t + ttl).await.unwrap());
        assert!(!repo.renew_hold(&id, "z", t, t + ttl).await.unwrap());

        // still held at the original expiry because of the renewal
        let original_expiry = at(8) + ttl;
        assert!(!repo
            .try_acquire_hold(&id, "b", original_expiry, original_expiry + ttl)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reservation_update_is_conditional_on_status() {
        let repo = InMemoryReservationRepository::default();
        let window = TimeWindow::new(at(10), at(11)).unwrap();
        let id = repo
            .create(Reservation::new("st", "alice", window, "123456", at(8)))
            .await
            .unwrap();

        let to_in_use = ReservationPatch::status(ReservationStatus::InUse, at(10));
        assert!(repo
            .conditional_update(&id, ReservationStatus::Booked, to_in_use.clone())
            .await
            .unwrap());
        assert!(!repo
            .conditional_update(
                &id,
                ReservationStatus::Booked,
                ReservationPatch::status(ReservationStatus::Cancel, at(10))
            )
            .await
            .unwrap());
        let stored = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::InUse);
    }

    #[tokio::test]
    async fn find_active_excludes_given_statuses() {
        let repo = InMemoryReservationRepository::default();
        let mut done = Reservation::new(
            "st",
            "alice",
            TimeWindow::new(at(8), at(9)).unwrap(),
            "111111",
            at(7),
        );
        done.status = ReservationStatus::Completed;
        repo.create(done).await.unwrap();
        repo.create(Reservation::new(
            "st",
            "bob",
            TimeWindow::new(at(10), at(11)).unwrap(),
            "222222",
            at(7),
        ))
        .await
        .unwrap();
        repo.create(Reservation::new(
            "other",
            "bob",
            TimeWindow::new(at(10), at(11)).unwrap(),
            "333333",
            at(7),
        ))
        .await
        .unwrap();

        let active = repo
            .find_active("st", &ReservationStatus::TERMINAL)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, "bob");
        assert_eq!(repo.find_by_user("bob").await.unwrap().len(), 2);
    }
}
