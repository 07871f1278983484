//! tsi-daemon library target.
//!
//! Exposes the router, state and shared operations for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod config;
pub mod error;
pub mod hub;
pub mod routes;
pub mod service;
pub mod state;
