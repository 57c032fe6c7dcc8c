//! Station repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Station, StationStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Register a new station
    async fn save(&self, station: Station) -> DomainResult<()>;

    /// Find station by ID
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>>;

    /// All stations ordered by code
    async fn find_all(&self) -> DomainResult<Vec<Station>>;

    /// Set `new_status` only if the stored status and revision still equal
    /// the expected values. Bumps the revision and stamps `updated_at = now`
    /// on success.
    async fn conditional_update_status(
        &self,
        id: &str,
        expected_status: StationStatus,
        expected_revision: i64,
        new_status: StationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Take the admission hold if nobody holds it or the previous hold
    /// expired before `now`.
    async fn try_acquire_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Push the hold's expiry to `expires_at`, only if `token` still owns it
    /// and it has not expired at `now`.
    async fn renew_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Drop the hold if `token` still owns it.
    async fn release_hold(&self, id: &str, token: &str) -> DomainResult<bool>;
}
