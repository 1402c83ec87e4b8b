//! Ambient support for the circq workspace: errors, layered configuration,
//! tracing setup and CPU pinning.

pub mod affinity;
pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{
    LoggingConfig, Settings, StressConfig, MAX_TOTAL_ITEMS, SUPPORTED_CAPACITIES,
};
pub use error::{CircqError, Result};
