//! Periodic harvest of traced errors.
//!
//! Each cycle swaps the shared harvest buffer, encodes it, and hands the
//! payload to a [`PayloadSink`]. Delivery itself lives outside this crate.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use apm_common::{AgentRunId, Result};
use apm_errors::{build_payload, ErrorHarvest, HarvestPayload};
use serde::Serialize;
use tracing::{debug, info, warn};

const HARVEST_THREAD_NAME: &str = "apm-harvest";

/// Destination for encoded harvest payloads.
pub trait PayloadSink: Send {
    fn deliver(&mut self, payload: HarvestPayload) -> Result<()>;
}

/// Sink that keeps payloads in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    payloads: Arc<Mutex<Vec<HarvestPayload>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything delivered so far.
    pub fn take(&self) -> Vec<HarvestPayload> {
        let mut payloads = self
            .payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *payloads)
    }

    pub fn len(&self) -> usize {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PayloadSink for MemorySink {
    fn deliver(&mut self, payload: HarvestPayload) -> Result<()> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload);
        Ok(())
    }
}

/// Outcome of one harvest cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Traced errors in the cycle's buffer.
    pub errors: usize,
    /// Errors turned away because the buffer was full.
    pub dropped: usize,
    /// Encoded payload size; zero when nothing was sent.
    pub bytes: usize,
    /// Whether the sink accepted the payload.
    pub delivered: bool,
}

/// Drives harvest cycles against a shared [`ErrorHarvest`].
pub struct Harvester {
    errors: Arc<ErrorHarvest>,
    run_id: AgentRunId,
    sink: Box<dyn PayloadSink>,
    period: Duration,
}

impl fmt::Debug for Harvester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvester")
            .field("run_id", &self.run_id)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl Harvester {
    pub fn new(
        errors: Arc<ErrorHarvest>,
        run_id: AgentRunId,
        sink: Box<dyn PayloadSink>,
        period: Duration,
    ) -> Self {
        Harvester {
            errors,
            run_id,
            sink,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one cycle: swap, encode, deliver.
    ///
    /// Encoding and delivery failures are logged and the cycle's errors are
    /// discarded; the next cycle starts from an empty buffer either way.
    pub fn harvest_once(&mut self) -> HarvestReport {
        let drained = self.errors.swap();
        let mut report = HarvestReport {
            errors: drained.len(),
            dropped: drained.dropped(),
            ..HarvestReport::default()
        };

        let payload = match build_payload(&drained, &self.run_id) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(dropped = report.dropped, "no traced errors to harvest");
                return report;
            }
            Err(err) => {
                warn!(
                    code = err.code(),
                    category = %err.category(),
                    error = %err,
                    errors = report.errors,
                    "failed to encode error payload"
                );
                return report;
            }
        };

        report.bytes = payload.body().len();
        match self.sink.deliver(payload) {
            Ok(()) => {
                report.delivered = true;
                info!(
                    run_id = %self.run_id,
                    errors = report.errors,
                    dropped = report.dropped,
                    bytes = report.bytes,
                    "harvested traced errors"
                );
            }
            Err(err) => {
                warn!(
                    code = err.code(),
                    category = %err.category(),
                    error = %err,
                    "error payload delivery failed"
                );
            }
        }
        report
    }

    /// Run cycles on a background thread until the handle is stopped.
    pub fn spawn(mut self) -> io::Result<HarvestHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = self.period;
        let thread = thread::Builder::new()
            .name(HARVEST_THREAD_NAME.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        self.harvest_once();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("harvester stopping, running final cycle");
                        return self.harvest_once();
                    }
                }
            })?;

        Ok(HarvestHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Handle to a running harvest thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct HarvestHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<HarvestReport>>,
}

impl HarvestHandle {
    /// Stop the thread and return the report of its final cycle.
    ///
    /// `None` when the thread panicked.
    pub fn stop(mut self) -> Option<HarvestReport> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<HarvestReport> {
        if let Some(stop) = self.stop.take() {
            // the thread may already be gone; disconnect stops it too
            let _ = stop.send(());
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("harvest thread panicked");
                None
            }
        }
    }
}

impl Drop for HarvestHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_common::Error;
    use apm_errors::{ErrorRecord, TransactionErrorBuffer, TxnEvent};
    use chrono::Utc;

    struct FailingSink;

    impl PayloadSink for FailingSink {
        fn deliver(&mut self, _payload: HarvestPayload) -> Result<()> {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "collector unreachable",
            )))
        }
    }

    fn record_errors(harvest: &ErrorHarvest, count: usize) {
        let mut errors = TransactionErrorBuffer::new(count);
        for i in 0..count {
            errors.add(ErrorRecord::new(Utc::now(), format!("e{}", i), "Error"));
        }
        let summary =
            TxnEvent::new("WebTransaction/Go/unit", Utc::now(), Duration::ZERO).into_shared();
        harvest.merge(&errors, &summary);
    }

    fn harvester(errors: &Arc<ErrorHarvest>, sink: Box<dyn PayloadSink>) -> Harvester {
        Harvester::new(
            Arc::clone(errors),
            AgentRunId::from("run-unit"),
            sink,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_empty_cycle_sends_nothing() {
        let errors = Arc::new(ErrorHarvest::new(5));
        let sink = MemorySink::new();
        let report = harvester(&errors, Box::new(sink.clone())).harvest_once();

        assert_eq!(report, HarvestReport::default());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_cycle_delivers_and_resets() {
        let errors = Arc::new(ErrorHarvest::new(2));
        record_errors(&errors, 3);
        let sink = MemorySink::new();
        let mut h = harvester(&errors, Box::new(sink.clone()));

        let report = h.harvest_once();
        assert_eq!(report.errors, 2);
        assert_eq!(report.dropped, 1);
        assert!(report.delivered);

        let payloads = sink.take();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].method(), "error_data");
        assert_eq!(report.bytes, payloads[0].body().len());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_delivery_failure_discards_cycle() {
        let errors = Arc::new(ErrorHarvest::new(5));
        record_errors(&errors, 1);
        let mut h = harvester(&errors, Box::new(FailingSink));

        let report = h.harvest_once();
        assert_eq!(report.errors, 1);
        assert!(report.bytes > 0);
        assert!(!report.delivered);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_stop_runs_final_cycle() {
        let errors = Arc::new(ErrorHarvest::new(5));
        let sink = MemorySink::new();
        let handle = harvester(&errors, Box::new(sink.clone())).spawn().unwrap();

        record_errors(&errors, 2);
        let report = handle.stop().unwrap();
        assert_eq!(report.errors, 2);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_drop_stops_thread() {
        let errors = Arc::new(ErrorHarvest::new(5));
        let sink = MemorySink::new();
        {
            let _handle = harvester(&errors, Box::new(sink.clone())).spawn().unwrap();
            record_errors(&errors, 1);
        }
        assert_eq!(sink.len(), 1);
    }
}
