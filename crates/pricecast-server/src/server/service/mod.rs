//! HTTP service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - routes and shared state (`PriceService`).

pub mod handler;
