//! # Station Booking
//!
//! Reservation admission and lifecycle engine for charging stations.
//!
//! ## Architecture
//!
//! - **domain**: reservations, stations, the transition table, repository traits
//! - **application**: admission, arrival, lifecycle, the booking facade and the expiration sweeper
//! - **infrastructure**: SeaORM (SQLite) and in-memory repository providers
//! - **interfaces**: REST API with Swagger documentation
//! - **shared**: errors, clock, retry, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use config::{default_config_path, AppConfig, StorageBackend};

// Re-export database types for easy access
pub use infrastructure::{
    init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider,
};

// Re-export API router
pub use interfaces::http::create_api_router;

pub use application::{BookingService, BookingSettings, ExpirationSweeper};
pub use domain::{Actor, DomainError, Reservation, ReservationStatus, Station, StationStatus};
