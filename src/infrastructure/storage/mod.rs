//! Storage backends that live entirely in process memory

pub mod memory;

pub use memory::{InMemoryRepositoryProvider, InMemoryReservationRepository, InMemoryStationRepository};
