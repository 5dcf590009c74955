//! Agent run identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run identifier assigned by the collector when the agent connects.
///
/// Every harvest payload is addressed with the run ID of the connection it
/// was collected under. The value is opaque to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentRunId(String);

impl AgentRunId {
    pub fn new(id: impl Into<String>) -> Self {
        AgentRunId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentRunId {
    fn from(id: &str) -> Self {
        AgentRunId(id.to_string())
    }
}

impl From<String> for AgentRunId {
    fn from(id: String) -> Self {
        AgentRunId(id)
    }
}
