//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod repository_provider;
pub mod reservation_repository;
pub mod station_repository;

pub use repository_provider::SeaOrmRepositoryProvider;
