//! HTTP REST API interfaces
//!
//! - `actor`: caller identity from gateway headers
//! - `common`: response envelope, error mapping, validated JSON
//! - `modules`: handlers per resource
//! - `router`: API router with Swagger documentation

pub mod actor;
pub mod common;
pub mod modules;
pub mod router;

pub use router::create_api_router;
