//! Fuzz target for agent.json configuration parsing.
//!
//! Parsing and validation must return errors, never panic. Anything that
//! validates must build the error buffers, an attribute filter, and survive
//! a harvest swap.

#![no_main]

use apm_common::AgentConfig;
use apm_errors::{AttributeFilter, ErrorHarvest, TransactionErrorBuffer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<AgentConfig>(data) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }

    let collector = &config.error_collector;
    let filter = AttributeFilter::new(&config.attributes, &collector.attributes);
    let _ = filter.destinations("request.headers.host");

    let txn = TransactionErrorBuffer::new(collector.txn_capacity());
    assert_eq!(txn.capacity(), collector.txn_capacity());
    let harvest = ErrorHarvest::new(collector.max_harvest_errors);
    assert_eq!(harvest.swap().capacity(), collector.max_harvest_errors);
});
