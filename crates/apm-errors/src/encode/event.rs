use std::io;

use apm_common::Result;
use serde::Serialize;

use super::{duration_secs, time_to_secs};
use crate::attributes::DestinationSet;
use crate::record::ErrorRecord;
use crate::summary::TransactionSummary;

const ERROR_EVENT_TYPE: &str = "TransactionError";

#[derive(Serialize)]
struct EventIntrinsics<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(rename = "error.class")]
    class: &'a str,
    #[serde(rename = "error.message")]
    message: &'a str,
    timestamp: f64,
    #[serde(rename = "transactionName")]
    transaction_name: &'a str,
    duration: f64,
    #[serde(rename = "queueDuration", skip_serializing_if = "Option::is_none")]
    queue_duration: Option<f64>,
    #[serde(rename = "externalCallCount", skip_serializing_if = "Option::is_none")]
    external_call_count: Option<u64>,
    #[serde(rename = "externalDuration", skip_serializing_if = "Option::is_none")]
    external_duration: Option<f64>,
    #[serde(rename = "databaseCallCount", skip_serializing_if = "Option::is_none")]
    database_call_count: Option<u64>,
    #[serde(rename = "databaseDuration", skip_serializing_if = "Option::is_none")]
    database_duration: Option<f64>,
    #[serde(rename = "nr.syntheticsResourceId", skip_serializing_if = "Option::is_none")]
    synthetics_resource_id: Option<&'a str>,
    #[serde(rename = "nr.syntheticsJobId", skip_serializing_if = "Option::is_none")]
    synthetics_job_id: Option<&'a str>,
    #[serde(rename = "nr.syntheticsMonitorId", skip_serializing_if = "Option::is_none")]
    synthetics_monitor_id: Option<&'a str>,
}

/// Write one error event: `[intrinsics, userAttributes, agentAttributes]`.
///
/// Call stats appear only when at least one call was made; queueing only
/// when it is non-zero.
pub fn write_error_event<W: io::Write>(
    writer: W,
    record: &ErrorRecord,
    summary: &dyn TransactionSummary,
) -> Result<()> {
    let txn = summary.intrinsics();
    let external = txn.external.filter(|s| s.call_count > 0);
    let datastore = txn.datastore.filter(|s| s.call_count > 0);
    let synthetics = txn.synthetics.as_ref();

    let intrinsics = EventIntrinsics {
        event_type: ERROR_EVENT_TYPE,
        class: record.class(),
        message: record.message(),
        timestamp: time_to_secs(record.when()),
        transaction_name: summary.final_name(),
        duration: duration_secs(txn.duration),
        queue_duration: txn.queuing.filter(|q| !q.is_zero()).map(duration_secs),
        external_call_count: external.map(|s| s.call_count),
        external_duration: external.map(|s| duration_secs(s.duration)),
        database_call_count: datastore.map(|s| s.call_count),
        database_duration: datastore.map(|s| duration_secs(s.duration)),
        synthetics_resource_id: synthetics.map(|s| s.resource_id.as_str()),
        synthetics_job_id: synthetics.map(|s| s.job_id.as_str()),
        synthetics_monitor_id: synthetics.map(|s| s.monitor_id.as_str()),
    };

    let event = (
        intrinsics,
        summary.user_attributes(DestinationSet::ERROR, record.extra_attributes()),
        summary.agent_attributes(DestinationSet::ERROR),
    );
    serde_json::to_writer(writer, &event)?;
    Ok(())
}
