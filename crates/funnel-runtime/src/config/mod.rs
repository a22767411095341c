//! Configuration module for the Funnel runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the server, the dispatch pipeline and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    FunnelConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PipelineConfig,
    ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
