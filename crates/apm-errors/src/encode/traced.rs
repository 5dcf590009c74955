use std::io;

use apm_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{duration_secs, time_to_millis};
use crate::attributes::{AttributeMap, DestinationSet};
use crate::record::{ErrorRecord, StackTrace};
use crate::summary::TransactionSummary;

/// Fifth element of a traced error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedErrorDetails {
    #[serde(rename = "agentAttributes")]
    pub agent_attributes: AttributeMap,
    #[serde(rename = "userAttributes")]
    pub user_attributes: AttributeMap,
    pub intrinsics: TracedIntrinsics,
    // absent, not null, when no trace was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<StackTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedIntrinsics {
    #[serde(rename = "totalTime")]
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetics_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetics_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetics_monitor_id: Option<String>,
}

#[derive(Serialize)]
struct Details<'a> {
    #[serde(rename = "agentAttributes")]
    agent_attributes: AttributeMap,
    #[serde(rename = "userAttributes")]
    user_attributes: AttributeMap,
    intrinsics: Intrinsics<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<&'a StackTrace>,
}

#[derive(Serialize)]
struct Intrinsics<'a> {
    #[serde(rename = "totalTime")]
    total_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    synthetics_resource_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synthetics_job_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synthetics_monitor_id: Option<&'a str>,
}

/// Write one traced error:
/// `[timestampMillis, finalName, message, class, details]`.
pub fn write_traced_error<W: io::Write>(
    writer: W,
    record: &ErrorRecord,
    summary: &dyn TransactionSummary,
) -> Result<()> {
    let txn = summary.intrinsics();
    let synthetics = txn.synthetics.as_ref();
    let details = Details {
        agent_attributes: summary.agent_attributes(DestinationSet::ERROR),
        user_attributes: summary
            .user_attributes(DestinationSet::ERROR, record.extra_attributes()),
        intrinsics: Intrinsics {
            total_time: duration_secs(txn.total_time),
            synthetics_resource_id: synthetics.map(|s| s.resource_id.as_str()),
            synthetics_job_id: synthetics.map(|s| s.job_id.as_str()),
            synthetics_monitor_id: synthetics.map(|s| s.monitor_id.as_str()),
        },
        stack_trace: record.stack_trace(),
    };

    let traced = (
        time_to_millis(record.when()),
        summary.final_name(),
        record.message(),
        record.class(),
        details,
    );
    serde_json::to_writer(writer, &traced)?;
    Ok(())
}

/// A traced error read back from its wire form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecodedTracedError {
    pub timestamp_millis: f64,
    pub transaction_name: String,
    pub message: String,
    pub class: String,
    pub details: TracedErrorDetails,
}

impl DecodedTracedError {
    /// Timestamp rounded to the millisecond.
    pub fn when(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis.round() as i64)
    }
}

/// Parse a single traced-error array.
pub fn decode_traced_error(bytes: &[u8]) -> Result<DecodedTracedError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeValue, Attributes};
    use crate::summary::{Synthetics, TxnEvent};
    use chrono::TimeZone;
    use std::time::Duration;

    fn when() -> DateTime<Utc> {
        Utc.timestamp_opt(1_417_136_460, 0).unwrap()
    }

    fn summary() -> TxnEvent {
        let mut attrs = Attributes::default();
        attrs.add_agent("request.method", "GET");
        attrs.add_user("zip", 456).unwrap();
        TxnEvent::new("WebTransaction/Go/hello", when(), Duration::from_secs(2))
            .with_attributes(attrs)
    }

    fn encode(record: &ErrorRecord, summary: &TxnEvent) -> String {
        let mut buf = Vec::new();
        write_traced_error(&mut buf, record, summary).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_traced_error_without_stack() {
        let record = ErrorRecord::new(when(), "my msg", "my class");
        let json = encode(&record, &summary());
        assert_eq!(
            json,
            concat!(
                r#"[1417136460000.0,"WebTransaction/Go/hello","my msg","my class","#,
                r#"{"agentAttributes":{"request.method":"GET"},"#,
                r#""userAttributes":{"zip":456},"#,
                r#""intrinsics":{"totalTime":2.0}}]"#
            )
        );
        assert!(!json.contains("stack_trace"));
    }

    #[test]
    fn test_traced_error_with_stack() {
        let record = ErrorRecord::from_status_code(when(), 500)
            .with_stack_trace(["main.handler", "net/http.serve"].into_iter().collect());
        let value: serde_json::Value = serde_json::from_str(&encode(&record, &summary())).unwrap();

        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert!(arr[0].is_f64());
        assert_eq!(arr[3], "500");
        assert!(arr[3].is_string());
        assert_eq!(
            arr[4]["stack_trace"],
            serde_json::json!(["main.handler", "net/http.serve"])
        );
    }

    #[test]
    fn test_extra_attributes_reach_user_attributes() {
        let mut extra = AttributeMap::new();
        extra.insert("zip".to_string(), AttributeValue::from("override"));
        let record = ErrorRecord::new(when(), "m", "c").with_extra_attributes(extra);

        let decoded = decode_traced_error(encode(&record, &summary()).as_bytes()).unwrap();
        assert_eq!(
            decoded.details.user_attributes["zip"],
            AttributeValue::from("override")
        );
    }

    #[test]
    fn test_synthetics_intrinsics() {
        let summary = summary().with_synthetics(Synthetics {
            resource_id: "r-1".to_string(),
            job_id: "j-1".to_string(),
            monitor_id: "m-1".to_string(),
        });
        let record = ErrorRecord::new(when(), "m", "c");
        let decoded = decode_traced_error(encode(&record, &summary).as_bytes()).unwrap();
        let intrinsics = decoded.details.intrinsics;
        assert_eq!(intrinsics.total_time, 2.0);
        assert_eq!(intrinsics.synthetics_resource_id.as_deref(), Some("r-1"));
        assert_eq!(intrinsics.synthetics_job_id.as_deref(), Some("j-1"));
        assert_eq!(intrinsics.synthetics_monitor_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn test_round_trip_recovers_fields() {
        let t = Utc.timestamp_millis_opt(1_700_000_000_789).unwrap();
        let record = ErrorRecord::new(t, "connection reset", "IoError")
            .with_stack_trace(["a", "b", "c"].into_iter().collect());
        let decoded = decode_traced_error(encode(&record, &summary()).as_bytes()).unwrap();

        assert_eq!(decoded.when(), Some(t));
        assert_eq!(decoded.transaction_name, "WebTransaction/Go/hello");
        assert_eq!(decoded.message, "connection reset");
        assert_eq!(decoded.class, "IoError");
        assert_eq!(
            decoded.details.stack_trace.as_ref().map(StackTrace::frames),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }
}
