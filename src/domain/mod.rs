//! Core booking entities, types and repository traits

pub mod actor;
pub mod repositories;
pub mod reservation;
pub mod station;

pub use actor::{Actor, Role};
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{Reservation, ReservationStatus, TimeWindow, Trigger};
pub use station::{Station, StationStatus};

pub use crate::shared::errors::DomainError;
