//! APM agent wiring for the error collector.
//!
//! Loads [`AgentConfig`](apm_common::AgentConfig), sets up structured
//! logging, hands out per-transaction error buffers, and runs the harvest
//! loop that ships traced errors to a [`PayloadSink`].

pub mod agent;
pub mod harvester;
pub mod logging;

pub use agent::Agent;
pub use harvester::{HarvestHandle, HarvestReport, Harvester, MemorySink, PayloadSink};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
