//! grace-core — shared types for the graceful traffic lifecycle controller.
//!
//! Holds the configuration surface (`GraceConfig` and its projections),
//! the warm-up metadata vocabulary exchanged through service registries,
//! and the process-wide `LifecycleClock` that readiness is derived from.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod time;
pub mod types;

pub use config::{GraceConfig, SharedConfig, ShutdownConfig, WarmUpPolicy, rule_key};
pub use error::{ConfigError, ConfigResult};
pub use lifecycle::LifecycleClock;
pub use time::epoch_millis;
pub use types::*;
