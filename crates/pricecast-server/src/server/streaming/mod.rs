//! Per-request price streaming.
//!
//! ## Structure
//!
//! - [`generator`] - timer-driven producer of prices.
//! - [`writer`] - formats and writes each price as an SSE record.
//! - [`session`] - wires one generator to one writer for a single request.

pub mod generator;
pub mod session;
pub mod writer;
