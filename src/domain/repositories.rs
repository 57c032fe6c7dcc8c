//! Repository traits for the domain layer

use super::reservation::ReservationRepository;
use super::station::StationRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let station = repos.stations().find_by_id("st-1").await?;
///     let active = repos.reservations().find_active("st-1", &ReservationStatus::TERMINAL).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn stations(&self) -> &dyn StationRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
}
