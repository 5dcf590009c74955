//! Agent facade tying configuration to error capture and harvest.

use std::sync::Arc;

use apm_common::{AgentConfig, AgentRunId, ConfigResolver, ConfigSource, Result};
use apm_errors::{AttributeFilter, Attributes, ErrorHarvest, SharedSummary, TransactionErrorBuffer};
use tracing::{debug, info};

use crate::harvester::{Harvester, PayloadSink};

/// Entry point used by instrumentation.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    filter: Arc<AttributeFilter>,
    errors: Arc<ErrorHarvest>,
}

impl Agent {
    /// Build an agent from validated configuration.
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let filter = Arc::new(AttributeFilter::new(
            &config.attributes,
            &config.error_collector.attributes,
        ));
        let errors = Arc::new(ErrorHarvest::new(config.error_collector.max_harvest_errors));
        info!(
            app = %config.app_name,
            enabled = config.error_collector.enabled,
            max_txn_errors = config.error_collector.max_txn_errors,
            max_harvest_errors = config.error_collector.max_harvest_errors,
            "error collector configured"
        );
        Ok(Agent {
            config,
            filter,
            errors,
        })
    }

    /// Load configuration through `resolver` and build an agent from it.
    pub fn from_resolver(resolver: &ConfigResolver) -> Result<(Self, ConfigSource)> {
        let (config, source) = resolver.load()?;
        debug!(
            resolution = %source.resolution,
            path = ?source.path,
            "agent configuration loaded"
        );
        Ok((Agent::new(config)?, source))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Error buffer for a transaction that is starting.
    pub fn txn_errors(&self) -> TransactionErrorBuffer {
        TransactionErrorBuffer::new(self.config.error_collector.txn_capacity())
    }

    /// Attribute store using the configured filter.
    pub fn attributes(&self) -> Attributes {
        Attributes::new(Arc::clone(&self.filter))
    }

    /// Fold a finished transaction's errors into the current harvest.
    pub fn end_transaction(
        &self,
        errors: &TransactionErrorBuffer,
        summary: &SharedSummary,
    ) -> usize {
        if errors.dropped() > 0 {
            debug!(
                txn = summary.final_name(),
                dropped = errors.dropped(),
                "transaction error limit reached"
            );
        }
        self.errors.merge(errors, summary)
    }

    pub fn error_harvest(&self) -> &Arc<ErrorHarvest> {
        &self.errors
    }

    /// Harvester for this agent's errors, cycling at the configured period.
    pub fn harvester(&self, run_id: AgentRunId, sink: Box<dyn PayloadSink>) -> Harvester {
        Harvester::new(
            Arc::clone(&self.errors),
            run_id,
            sink,
            self.config.harvest_period(),
        )
    }
}
