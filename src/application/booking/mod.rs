//! Reservation booking: admission, arrival, lifecycle

pub mod admission;
pub mod arrival;
pub mod availability;
pub mod hold;
pub mod lifecycle;
pub mod pin;
pub mod service;

pub use admission::AdmissionController;
pub use arrival::ArrivalGate;
pub use availability::{Availability, AvailabilityChecker};
pub use hold::{StationHold, StationHolds};
pub use lifecycle::LifecycleManager;
pub use pin::{PinGenerator, RandomPinGenerator};
pub use service::{BookingService, BookingSettings};
