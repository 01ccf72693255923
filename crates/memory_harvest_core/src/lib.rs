//! Shared memory-harvest domain primitives.
//!
//! This crate owns the enumeration/orchestration decision logic and the
//! work-unit and metric-record contracts. It intentionally excludes AWS SDK
//! and Lambda runtime concerns.

pub mod contract;
pub mod metrics;
pub mod orchestration;
pub mod pagination;
pub mod storage_keys;
