pub use memory_harvest_core::{contract, metrics, orchestration, pagination, storage_keys};
