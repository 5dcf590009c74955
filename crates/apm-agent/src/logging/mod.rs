//! Structured logging for the agent.
//!
//! The agent runs inside someone else's process, so logs go to stderr and
//! installation never replaces a subscriber the host already set up.
//!
//! ```ignore
//! use apm_agent::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events the agent's filter lets through.
const AGENT_TARGETS: [&str; 3] = ["apm_agent", "apm_errors", "apm_common"];

/// Filter directives for the agent crates at `level`.
pub fn filter_directives(level: LogLevel) -> String {
    AGENT_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Directives for the installed filter.
///
/// Raw `RUST_LOG` directives are used only when neither `APM_LOG` nor the
/// host chose a level; otherwise `config.level` applies to the agent crates.
pub fn select_directives(config: &LogConfig) -> String {
    match &config.env_directives {
        Some(directives) => directives.clone(),
        None => filter_directives(config.level),
    }
}

/// Install a global subscriber for agent logs.
///
/// Returns false when a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_new(select_directives(config))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config.level)));

    let installed = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false);
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    installed.is_ok()
}
