//! Shared types for the APM error collector.
//!
//! This crate provides foundational types used by the collector crates:
//! - Agent run identity assigned by the collector
//! - Common error types with stable codes
//! - Agent configuration loading and validation

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    AgentConfig, AttributeConfig, ConfigPaths, ConfigResolution, ConfigResolver, ConfigSource,
    ErrorCollectorConfig,
};
pub use error::{Error, ErrorCategory, Result};
pub use id::AgentRunId;

/// Schema version for agent configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
