//! Telemetry: logging setup and client counters.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LOG_FORMATS, LOG_LEVELS};
pub use metrics::{ClientStats, Counter};
