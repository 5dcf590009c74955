//! Collector wire encodings for harvested errors.
//!
//! The same record and transaction summary are written in two shapes:
//! - traced errors: `[timestampMillis, txnName, message, class, details]`
//! - error events: `[intrinsics, userAttributes, agentAttributes]`
//!
//! Both write JSON straight into the caller's writer.

mod event;
mod traced;

pub use event::write_error_event;
pub use traced::{
    decode_traced_error, write_traced_error, DecodedTracedError, TracedErrorDetails,
    TracedIntrinsics,
};

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Milliseconds since the epoch with sub-millisecond fraction.
pub(crate) fn time_to_millis(t: DateTime<Utc>) -> f64 {
    t.timestamp_micros() as f64 / 1_000.0
}

/// Seconds since the epoch with sub-second fraction.
pub(crate) fn time_to_secs(t: DateTime<Utc>) -> f64 {
    t.timestamp_micros() as f64 / 1_000_000.0
}

pub(crate) fn duration_secs(d: Duration) -> f64 {
    d.as_secs_f64()
}
