//! Station holds
//!
//! A hold is a TTL lease on the station record, taken by conditional
//! update. Admissions and moves to `InUse` run under it, so at most one of
//! them is deciding on a station at a time. A holder that may have stalled
//! calls [`StationHolds::fence`] before its write: the write goes ahead only
//! if the same token still owns a live hold.

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::clock::SharedClock;

pub const DEFAULT_HOLD_TTL_SECS: i64 = 15;

/// Proof of owning a station hold.
#[derive(Debug)]
pub struct StationHold {
    pub station_id: String,
    pub token: String,
}

pub struct StationHolds {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    ttl: Duration,
}

impl StationHolds {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock, ttl: Duration) -> Self {
        Self { repos, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the hold, or fail with a retryable `ConcurrencyConflict`.
    pub async fn acquire(&self, station_id: &str) -> DomainResult<StationHold> {
        let now = self.clock.now();
        let token = uuid::Uuid::new_v4().to_string();
        let acquired = self
            .repos
            .stations()
            .try_acquire_hold(station_id, &token, now, now + self.ttl)
            .await?;
        if !acquired {
            return Err(DomainError::ConcurrencyConflict(format!(
                "station {} is busy with another booking change",
                station_id
            )));
        }
        Ok(StationHold {
            station_id: station_id.to_string(),
            token,
        })
    }

    /// Confirm the hold is still ours and push its expiry a full TTL out.
    pub async fn fence(&self, hold: &StationHold) -> DomainResult<()> {
        let now = self.clock.now();
        let renewed = self
            .repos
            .stations()
            .renew_hold(&hold.station_id, &hold.token, now, now + self.ttl)
            .await?;
        if renewed {
            Ok(())
        } else {
            Err(lost(hold))
        }
    }

    /// Drop the hold. `Ok(false)` means it expired and may have been taken
    /// by someone else in the meantime.
    pub async fn release(&self, hold: &StationHold) -> DomainResult<bool> {
        let released = self
            .repos
            .stations()
            .release_hold(&hold.station_id, &hold.token)
            .await?;
        if !released {
            warn!(station_id = %hold.station_id, "Station hold expired before release");
        }
        Ok(released)
    }
}

fn lost(hold: &StationHold) -> DomainError {
    DomainError::ConcurrencyConflict(format!(
        "hold on station {} expired before the write",
        hold.station_id
    ))
}
