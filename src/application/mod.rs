pub mod booking;
pub mod services;

// Re-export key types for convenience
pub use booking::{
    AdmissionController, ArrivalGate, Availability, AvailabilityChecker, BookingService,
    BookingSettings, LifecycleManager, PinGenerator, RandomPinGenerator,
};
pub use services::{ExpirationSweeper, SweepReport, SweeperConfig, SweeperHandle};
