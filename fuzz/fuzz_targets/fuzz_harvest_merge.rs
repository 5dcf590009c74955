//! Fuzz target for the merge step and payload encoding.
//!
//! Arbitrary transactions are merged into a bounded harvest buffer, which
//! must stay within capacity, keep earlier entries in place, and encode to
//! valid JSON listing every entry.

#![no_main]

use std::time::Duration;

use apm_common::AgentRunId;
use apm_errors::{
    build_payload, merge_txn_errors, ErrorRecord, HarvestErrorBuffer, StackTrace,
    TransactionErrorBuffer, TxnEvent,
};
use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzError {
    millis: u32,
    message: String,
    class: String,
    frames: Vec<String>,
}

#[derive(Debug, Arbitrary)]
struct FuzzTxn {
    name: String,
    max: u8,
    errors: Vec<FuzzError>,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    capacity: u8,
    run_id: String,
    txns: Vec<FuzzTxn>,
}

fuzz_target!(|input: FuzzInput| {
    let capacity = usize::from(input.capacity);
    let mut harvest = HarvestErrorBuffer::new(capacity);

    for txn in input.txns.iter().take(32) {
        let max = usize::from(txn.max % 16);
        let mut errors = TransactionErrorBuffer::new(max);
        for e in &txn.errors {
            let Some(when) = Utc.timestamp_millis_opt(i64::from(e.millis)).single() else {
                continue;
            };
            let mut record = ErrorRecord::new(when, e.message.clone(), e.class.clone());
            if !e.frames.is_empty() {
                record = record.with_stack_trace(StackTrace::new(e.frames.clone()));
            }
            errors.add(record);
        }
        assert!(errors.len() <= max);

        let summary = TxnEvent::new(txn.name.clone(), Utc::now(), Duration::ZERO).into_shared();
        let before: Vec<String> = harvest
            .iter()
            .map(|h| h.record().message().to_string())
            .collect();
        merge_txn_errors(&mut harvest, &errors, &summary);

        assert!(harvest.len() <= capacity);
        for (kept, old) in harvest.iter().zip(&before) {
            assert_eq!(kept.record().message(), old);
        }
    }

    let run_id = AgentRunId::from(input.run_id);
    match build_payload(&harvest, &run_id) {
        Ok(Some(payload)) => {
            let value: serde_json::Value =
                serde_json::from_slice(payload.body()).expect("payload is valid JSON");
            assert_eq!(value[1].as_array().map(Vec::len), Some(harvest.len()));
        }
        Ok(None) => assert!(harvest.is_empty()),
        Err(_) => {}
    }
});
