//! Station aggregate

pub mod model;
pub mod repository;

pub use model::{AdmissionHold, Station, StationStatus};
pub use repository::StationRepository;
