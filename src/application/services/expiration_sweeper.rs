//! Expiration sweeper
//!
//! Periodically cancels `Booked` reservations whose arrival grace period
//! has passed, then reconciles station status. Each cancellation is a
//! conditional `Booked -> Cancel`, so a reservation confirmed in the
//! meantime is left alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::booking::LifecycleManager;
use crate::domain::reservation::Trigger;
use crate::domain::{Actor, DomainError, DomainResult, RepositoryProvider};
use crate::shared::clock::SharedClock;
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between sweep cycles
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub cancelled: usize,
    pub skipped: usize,
}

pub struct ExpirationSweeper {
    repos: Arc<dyn RepositoryProvider>,
    lifecycle: Arc<LifecycleManager>,
    clock: SharedClock,
    config: SweeperConfig,
    running: Arc<AtomicBool>,
}

impl ExpirationSweeper {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        lifecycle: Arc<LifecycleManager>,
        clock: SharedClock,
    ) -> Self {
        Self {
            repos,
            lifecycle,
            clock,
            config: SweeperConfig::default(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(mut self, config: SweeperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One pass over expired reservations.
    pub async fn run_cycle(&self) -> DomainResult<SweepReport> {
        let now = self.clock.now();
        let expired = self.repos.reservations().find_expired(now).await?;
        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for reservation in expired {
            let id = reservation.id.clone();
            match self
                .lifecycle
                .transition(reservation, Trigger::ExpirationSweep, &Actor::System, None)
                .await
            {
                Ok(_) => report.cancelled += 1,
                Err(DomainError::ConcurrencyConflict(_)) | Err(DomainError::InvalidTransition { .. }) => {
                    debug!(reservation_id = %id, "Reservation moved on before sweep");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(reservation_id = %id, error = %e, "Failed to expire reservation");
                    report.skipped += 1;
                }
            }
        }

        if let Err(e) = self.lifecycle.reconcile_stations().await {
            warn!(error = %e, "Station reconcile after sweep failed");
        }

        if report.cancelled > 0 {
            metrics::counter!("booking_sweep_cancelled_total").increment(report.cancelled as u64);
            info!(
                examined = report.examined,
                cancelled = report.cancelled,
                skipped = report.skipped,
                "Expired reservations cancelled"
            );
        }

        Ok(report)
    }

    /// Spawn the periodic loop. It ends when `shutdown` fires or the
    /// returned handle is stopped.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> SweeperHandle {
        let stop = ShutdownSignal::new();
        let stop_rx = stop.clone();
        let sweeper = self;

        let task = tokio::spawn(async move {
            sweeper.running.store(true, Ordering::SeqCst);
            info!(interval_secs = sweeper.config.interval_secs, "🧹 Expiration sweeper started");

            let mut interval =
                tokio::time::interval(Duration::from_secs(sweeper.config.interval_secs.max(1)));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = sweeper.run_cycle().await {
                            warn!(error = %e, "Expiration sweep error");
                        }
                    }
                    _ = shutdown.wait() => {
                        info!("🧹 Expiration sweeper shutting down");
                        break;
                    }
                    _ = stop_rx.wait() => break,
                }
            }

            sweeper.running.store(false, Ordering::SeqCst);
            info!("🧹 Expiration sweeper stopped");
        });

        SweeperHandle { stop, task }
    }
}

/// Handle to a running sweeper
pub struct SweeperHandle {
    stop: ShutdownSignal,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the loop and wait for the current cycle to finish.
    pub async fn stop(self) {
        self.stop.trigger();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Expiration sweeper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking::ArrivalGate;
    use crate::domain::reservation::{Reservation, ReservationStatus, TimeWindow};
    use crate::domain::station::{Station, StationStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::shared::clock::ManualClock;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    struct Fixture {
        repos: Arc<InMemoryRepositoryProvider>,
        clock: Arc<ManualClock>,
        lifecycle: Arc<LifecycleManager>,
        sweeper: Arc<ExpirationSweeper>,
        station_id: String,
    }

    async fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let clock = Arc::new(ManualClock::new(at(9, 0)));
        let station = Station::new("CP-1", at(8, 0));
        let station_id = station.id.clone();
        repos.stations().save(station).await.unwrap();

        let lifecycle = Arc::new(LifecycleManager::new(repos.clone(), clock.clone()));
        let sweeper = Arc::new(
            ExpirationSweeper::new(repos.clone(), lifecycle.clone(), clock.clone())
                .with_config(SweeperConfig { interval_secs: 1 }),
        );
        Fixture {
            repos,
            clock,
            lifecycle,
            sweeper,
            station_id,
        }
    }

    impl Fixture {
        async fn book(&self, start_h: u32) -> String {
            let window = TimeWindow::new(at(start_h, 0), at(start_h + 1, 0)).unwrap();
            let r = Reservation::new(&self.station_id, "alice", window, "123456", at(8, 0));
            let id = self.repos.reservations().create(r).await.unwrap();
            self.lifecycle.sync_station_status(&self.station_id).await.unwrap();
            id
        }

        async fn status_of(&self, id: &str) -> ReservationStatus {
            self.repos
                .reservations()
                .find_by_id(id)
                .await
                .unwrap()
                .unwrap()
                .status
        }

        async fn station_status(&self) -> StationStatus {
            self.repos
                .stations()
                .find_by_id(&self.station_id)
                .await
                .unwrap()
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn expired_booking_is_cancelled_and_station_freed() {
        let f = fixture().await;
        let id = f.book(10).await;
        assert_eq!(f.station_status().await, StationStatus::Booked);

        f.clock.set(at(10, 31));
        let report = f.sweeper.run_cycle().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                examined: 1,
                cancelled: 1,
                skipped: 0
            }
        );
        assert_eq!(f.status_of(&id).await, ReservationStatus::Cancel);
        assert_eq!(f.station_status().await, StationStatus::Available);
    }

    #[tokio::test]
    async fn grace_period_boundary_is_not_expired() {
        let f = fixture().await;
        let id = f.book(10).await;

        f.clock.set(at(10, 30));
        let report = f.sweeper.run_cycle().await.unwrap();

        assert_eq!(report.examined, 0);
        assert_eq!(f.status_of(&id).await, ReservationStatus::Booked);
    }

    #[tokio::test]
    async fn confirmed_reservation_is_untouched() {
        let f = fixture().await;
        let id = f.book(10).await;
        f.lifecycle
            .apply(&id, Trigger::AdminAccept, &Actor::Admin("ops".into()))
            .await
            .unwrap();

        f.clock.set(at(12, 0));
        let report = f.sweeper.run_cycle().await.unwrap();

        assert_eq!(report.examined, 0);
        assert_eq!(f.status_of(&id).await, ReservationStatus::InUse);
        assert_eq!(f.station_status().await, StationStatus::InUse);
    }

    #[tokio::test]
    async fn only_expired_bookings_go() {
        let f = fixture().await;
        let early = f.book(10).await;
        let late = f.book(14).await;

        f.clock.set(at(11, 0));
        f.sweeper.run_cycle().await.unwrap();

        assert_eq!(f.status_of(&early).await, ReservationStatus::Cancel);
        assert_eq!(f.status_of(&late).await, ReservationStatus::Booked);
        assert_eq!(f.station_status().await, StationStatus::Booked);
    }

    #[tokio::test]
    async fn reconciles_drifted_station_status() {
        let f = fixture().await;
        let station = f
            .repos
            .stations()
            .find_by_id(&f.station_id)
            .await
            .unwrap()
            .unwrap();
        f.repos
            .stations()
            .conditional_update_status(
                &f.station_id,
                station.status,
                station.revision,
                StationStatus::InUse,
                at(9, 0),
            )
            .await
            .unwrap();

        f.sweeper.run_cycle().await.unwrap();
        assert_eq!(f.station_status().await, StationStatus::Available);
    }

    #[tokio::test]
    async fn background_loop_sweeps_and_stops() {
        let f = fixture().await;
        let id = f.book(10).await;
        f.clock.set(at(11, 0));

        let handle = f.sweeper.clone().start(ShutdownSignal::new());

        let swept = tokio::time::timeout(Duration::from_secs(5), async {
            while f.status_of(&id).await != ReservationStatus::Cancel {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(swept.is_ok(), "sweeper never cancelled the reservation");
        assert!(f.sweeper.is_running());

        handle.stop().await;
        assert!(!f.sweeper.is_running());
    }

    #[tokio::test]
    async fn shutdown_signal_ends_loop() {
        let f = fixture().await;
        let shutdown = ShutdownSignal::new();
        let handle = f.sweeper.clone().start(shutdown.clone());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle.task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
        assert!(!f.sweeper.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweep_racing_arrival_has_exactly_one_winner() {
        for _ in 0..30 {
            let f = Arc::new(fixture().await);
            let id = f.book(10).await;
            // past the grace period but still inside the booked window
            f.clock.set(at(10, 31));
            let gate = ArrivalGate::new(f.lifecycle.clone(), f.clock.clone());

            let sweep = {
                let f = f.clone();
                tokio::spawn(async move { f.sweeper.run_cycle().await })
            };
            let arrival = {
                let id = id.clone();
                tokio::spawn(async move {
                    gate.confirm_arrival(&id, "123456", &Actor::User("alice".into()))
                        .await
                })
            };

            let report = sweep.await.unwrap().unwrap();
            let arrival = arrival.await.unwrap();

            match arrival {
                Ok(r) => {
                    assert_eq!(r.status, ReservationStatus::InUse);
                    assert_eq!(report.cancelled, 0);
                    assert_eq!(f.status_of(&id).await, ReservationStatus::InUse);
                    assert_eq!(f.station_status().await, StationStatus::InUse);
                }
                Err(e) => {
                    assert!(
                        matches!(e.code(), "INVALID_TRANSITION" | "CONCURRENCY_CONFLICT"),
                        "unexpected error {e:?}"
                    );
                    assert_eq!(report.cancelled, 1);
                    assert_eq!(f.status_of(&id).await, ReservationStatus::Cancel);
                    assert_eq!(f.station_status().await, StationStatus::Available);
                }
            }
        }
    }
}
