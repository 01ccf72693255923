//! AWS-oriented adapters and handlers for harvesting function memory metrics.
//!
//! This crate owns runtime integration details (Lambda handlers, queue
//! dispatch, metric queries and sinks) and exposes a single runtime module
//! boundary for the contract, pagination, orchestration and storage key
//! primitives.

pub mod adapters;
pub mod columnar;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod runtime;
