//! Reservation aggregate
//!
//! Contains the Reservation entity, its state machine, and repository interface.

pub mod model;
pub mod repository;

pub use model::{
    transition_target, Reservation, ReservationPatch, ReservationStatus, TimeWindow, Trigger,
    ARRIVAL_GRACE_MINUTES,
};
pub use repository::ReservationRepository;
