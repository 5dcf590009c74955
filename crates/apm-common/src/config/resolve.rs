//! Configuration resolution for the agent.
//!
//! Implements deterministic config resolution order:
//! 1. Explicit path or directory supplied by the host application
//! 2. Environment variables (APM_AGENT_CONFIG, APM_AGENT_CONFIG_DIR)
//! 3. XDG default (~/.config/apm-agent/)
//! 4. Built-in defaults

use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{AgentConfig, ConfigResolution, ConfigSource};
use crate::error::{Error, Result};

/// Environment variable naming the config file directly.
pub const ENV_CONFIG_PATH: &str = "APM_AGENT_CONFIG";

/// Environment variable naming a directory holding `agent.json`.
pub const ENV_CONFIG_DIR: &str = "APM_AGENT_CONFIG_DIR";

const CONFIG_FILENAME: &str = "agent.json";
const APP_DIR: &str = "apm-agent";

/// Configuration file paths supplied by the host application.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Directory containing `agent.json`
    pub config_dir: Option<PathBuf>,
    /// Explicit path to the config file
    pub config_path: Option<PathBuf>,
}

/// Configuration resolver with deterministic resolution order.
#[derive(Debug)]
pub struct ConfigResolver {
    paths: ConfigPaths,
}

impl ConfigResolver {
    pub fn new(paths: ConfigPaths) -> Self {
        ConfigResolver { paths }
    }

    /// Create a resolver with no explicit overrides.
    pub fn with_defaults() -> Self {
        ConfigResolver {
            paths: ConfigPaths::default(),
        }
    }

    /// Resolve the config file path.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. Explicit file, then explicit directory
        if let Some(ref path) = self.paths.config_path {
            return (Some(path.clone()), ConfigResolution::Explicit);
        }
        if let Some(ref dir) = self.paths.config_dir {
            let path = dir.join(CONFIG_FILENAME);
            if path.exists() {
                return (Some(path), ConfigResolution::Explicit);
            }
        }

        // 2. Environment
        if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
        }
        if let Ok(dir) = env::var(ENV_CONFIG_DIR) {
            let path = PathBuf::from(dir).join(CONFIG_FILENAME);
            if path.exists() {
                return (Some(path), ConfigResolution::EnvVar);
            }
        }

        // 3. XDG config dir
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join(APP_DIR).join(CONFIG_FILENAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. Default
        (None, ConfigResolution::Default)
    }

    /// Load the agent config from the resolved path or defaults.
    pub fn load(&self) -> Result<(AgentConfig, ConfigSource)> {
        let (path, resolution) = self.resolve_config_path();

        let Some(p) = path else {
            debug!("no agent config file found, using defaults");
            return Ok((
                AgentConfig::default(),
                ConfigSource {
                    path: None,
                    hash: None,
                    resolution: ConfigResolution::Default,
                },
            ));
        };

        let content = fs::read_to_string(&p).map_err(|e| {
            Error::Config(format!("failed to read config from {}: {}", p.display(), e))
        })?;
        let hash = compute_sha256(&content);

        let config: AgentConfig = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!("failed to parse {}: {}", p.display(), e))
        })?;
        config.validate()?;

        debug!(path = %p.display(), %resolution, "loaded agent config");
        Ok((
            config,
            ConfigSource {
                path: Some(p.to_string_lossy().to_string()),
                hash: Some(hash),
                resolution,
            },
        ))
    }
}

/// Compute SHA-256 hash of a string.
fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
