//! Error capture and harvest serialization for the APM agent.
//!
//! This crate provides:
//! - Immutable error records built from panics, errors, and status codes
//! - Bounded per-transaction and per-harvest error buffers
//! - The merge step folding transaction errors into the harvest
//! - Traced-error and error-event wire encodings
//! - The `error_data` harvest payload
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use apm_common::AgentRunId;
//! use apm_errors::{build_payload, ErrorHarvest, ErrorRecord, TransactionErrorBuffer, TxnEvent};
//! use chrono::Utc;
//!
//! let harvest = ErrorHarvest::new(20);
//!
//! let mut errors = TransactionErrorBuffer::new(5);
//! errors.add(ErrorRecord::from_status_code(Utc::now(), 503));
//! let summary = TxnEvent::new("WebTransaction/Go/checkout", Utc::now(), Duration::from_millis(40))
//!     .into_shared();
//! harvest.merge(&errors, &summary);
//!
//! let drained = harvest.swap();
//! let payload = build_payload(&drained, &AgentRunId::from("run-1")).unwrap();
//! assert_eq!(payload.map(|p| p.error_count()), Some(1));
//! ```

pub mod attributes;
pub mod encode;
pub mod harvest;
pub mod payload;
pub mod record;
pub mod summary;
pub mod txn;

pub use attributes::{AttributeFilter, AttributeMap, AttributeValue, Attributes, DestinationSet};
pub use encode::{decode_traced_error, write_error_event, write_traced_error, DecodedTracedError};
pub use harvest::{merge_txn_errors, ErrorHarvest, HarvestErrorBuffer, HarvestedError};
pub use payload::{build_payload, HarvestPayload, ERROR_DATA_METHOD};
pub use record::{status_text, ErrorRecord, StackTrace, PANIC_ERROR_CLASS};
pub use summary::{
    CallStats, SharedSummary, Synthetics, TransactionSummary, TxnEvent, TxnIntrinsics,
};
pub use txn::TransactionErrorBuffer;
