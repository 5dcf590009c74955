//! Harvest-cycle error buffer and the merge step feeding it.
//!
//! Every finished transaction merges its [`TransactionErrorBuffer`] into the
//! current cycle's [`HarvestErrorBuffer`]. The buffer is bounded like the
//! transaction buffer: first come, first kept. [`ErrorHarvest`] owns the
//! current buffer for the process and serializes merges against the
//! end-of-cycle swap.

use std::io;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use apm_common::Result;
use tracing::{debug, trace};

use crate::encode;
use crate::record::ErrorRecord;
use crate::summary::SharedSummary;
use crate::txn::{TransactionErrorBuffer, PREALLOCATED_RECORDS};

/// An error paired with the transaction it was captured in.
#[derive(Debug, Clone)]
pub struct HarvestedError {
    record: ErrorRecord,
    summary: SharedSummary,
}

impl HarvestedError {
    pub fn new(record: ErrorRecord, summary: SharedSummary) -> Self {
        HarvestedError { record, summary }
    }

    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    pub fn summary(&self) -> &SharedSummary {
        &self.summary
    }

    /// Write the traced-error array for this entry.
    pub fn write_traced<W: io::Write>(&self, writer: W) -> Result<()> {
        encode::write_traced_error(writer, &self.record, self.summary.as_ref())
    }

    /// Write the error-event array for this entry.
    pub fn write_event<W: io::Write>(&self, writer: W) -> Result<()> {
        encode::write_error_event(writer, &self.record, self.summary.as_ref())
    }
}

/// Errors collected during one harvest cycle.
#[derive(Debug, Clone)]
pub struct HarvestErrorBuffer {
    entries: Vec<HarvestedError>,
    capacity: usize,
    dropped: usize,
}

impl HarvestErrorBuffer {
    pub fn new(capacity: usize) -> Self {
        HarvestErrorBuffer {
            entries: Vec::with_capacity(capacity.min(PREALLOCATED_RECORDS)),
            capacity,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Records refused during merges because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HarvestedError> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[HarvestedError] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a HarvestErrorBuffer {
    type Item = &'a HarvestedError;
    type IntoIter = std::slice::Iter<'a, HarvestedError>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Fold a transaction's errors into the harvest buffer.
///
/// Records are taken in insertion order until the harvest buffer is full;
/// the first full check ends the merge. Returns the number merged.
pub fn merge_txn_errors(
    harvest: &mut HarvestErrorBuffer,
    txn: &TransactionErrorBuffer,
    summary: &SharedSummary,
) -> usize {
    let mut merged = 0;
    for record in txn {
        if harvest.is_full() {
            harvest.dropped += txn.len() - merged;
            debug!(
                txn = summary.final_name(),
                merged,
                dropped = txn.len() - merged,
                capacity = harvest.capacity,
                "harvest error buffer full"
            );
            break;
        }
        harvest
            .entries
            .push(HarvestedError::new(record.clone(), Arc::clone(summary)));
        merged += 1;
    }
    merged
}

/// Process-wide owner of the current cycle's error buffer.
///
/// Merges and the end-of-cycle [`swap`](ErrorHarvest::swap) take the same
/// lock, so a merge lands wholly in one cycle.
#[derive(Debug)]
pub struct ErrorHarvest {
    current: Mutex<HarvestErrorBuffer>,
}

impl ErrorHarvest {
    pub fn new(capacity: usize) -> Self {
        ErrorHarvest {
            current: Mutex::new(HarvestErrorBuffer::new(capacity)),
        }
    }

    // A panic while holding the lock cannot leave the buffer half-written:
    // the only mutation is a single push.
    fn lock(&self) -> MutexGuard<'_, HarvestErrorBuffer> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a finished transaction's errors into the current cycle.
    pub fn merge(&self, txn: &TransactionErrorBuffer, summary: &SharedSummary) -> usize {
        if txn.is_empty() {
            return 0;
        }
        let merged = merge_txn_errors(&mut self.lock(), txn, summary);
        trace!(txn = summary.final_name(), merged, "merged transaction errors");
        merged
    }

    /// Take the current buffer and start a new cycle with the same capacity.
    pub fn swap(&self) -> HarvestErrorBuffer {
        let mut current = self.lock();
        let fresh = HarvestErrorBuffer::new(current.capacity);
        mem::replace(&mut *current, fresh)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::TxnEvent;
    use chrono::Utc;
    use std::time::Duration;

    fn summary(name: &str) -> SharedSummary {
        TxnEvent::new(name, Utc::now(), Duration::from_millis(10)).into_shared()
    }

    fn txn_with(messages: &[&str]) -> TransactionErrorBuffer {
        let mut buf = TransactionErrorBuffer::new(messages.len());
        for msg in messages {
            buf.add(ErrorRecord::new(Utc::now(), *msg, "Error"));
        }
        buf
    }

    fn messages(harvest: &HarvestErrorBuffer) -> Vec<&str> {
        harvest.iter().map(|e| e.record().message()).collect()
    }

    #[test]
    fn test_three_transactions_into_capacity_three() {
        let mut harvest = HarvestErrorBuffer::new(3);
        let first = summary("WebTransaction/Go/first");
        let second = summary("WebTransaction/Go/second");
        let third = summary("WebTransaction/Go/third");

        assert_eq!(merge_txn_errors(&mut harvest, &txn_with(&["a1", "a2"]), &first), 2);
        assert_eq!(merge_txn_errors(&mut harvest, &txn_with(&["b1", "b2"]), &second), 1);
        assert_eq!(merge_txn_errors(&mut harvest, &txn_with(&["c1", "c2"]), &third), 0);

        assert_eq!(messages(&harvest), vec!["a1", "a2", "b1"]);
        assert_eq!(harvest.dropped(), 3);
        assert_eq!(
            harvest.entries()[2].summary().final_name(),
            "WebTransaction/Go/second"
        );
    }

    #[test]
    fn test_merge_preserves_existing_entries() {
        let mut harvest = HarvestErrorBuffer::new(10);
        let s = summary("WebTransaction/Go/a");
        merge_txn_errors(&mut harvest, &txn_with(&["x", "y"]), &s);
        merge_txn_errors(&mut harvest, &txn_with(&["z"]), &s);
        assert_eq!(messages(&harvest), vec!["x", "y", "z"]);
        assert_eq!(harvest.dropped(), 0);
    }

    #[test]
    fn test_zero_capacity_harvest_accepts_nothing() {
        let mut harvest = HarvestErrorBuffer::new(0);
        let merged = merge_txn_errors(&mut harvest, &txn_with(&["a"]), &summary("t"));
        assert_eq!(merged, 0);
        assert!(harvest.is_empty());
        assert!(harvest.is_full());
    }

    #[test]
    fn test_entries_share_one_summary() {
        let mut harvest = HarvestErrorBuffer::new(4);
        let s = summary("WebTransaction/Go/shared");
        merge_txn_errors(&mut harvest, &txn_with(&["a", "b"]), &s);
        assert!(Arc::ptr_eq(harvest.entries()[0].summary(), harvest.entries()[1].summary()));
    }

    #[test]
    fn test_swap_resets_with_same_capacity() {
        let harvest = ErrorHarvest::new(2);
        let s = summary("WebTransaction/Go/swap");
        harvest.merge(&txn_with(&["a", "b", "c"]), &s);
        assert_eq!(harvest.len(), 2);

        let drained = harvest.swap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained.dropped(), 1);
        assert!(harvest.is_empty());
        assert_eq!(harvest.capacity(), 2);

        harvest.merge(&txn_with(&["d"]), &s);
        assert_eq!(harvest.len(), 1);
        assert_eq!(drained.len(), 2);
    }

    #[test]
    fn test_huge_capacity_swaps_without_preallocating() {
        let harvest = ErrorHarvest::new(usize::MAX);
        harvest.merge(&txn_with(&["a"]), &summary("t"));
        let drained = harvest.swap();
        assert_eq!(drained.len(), 1);
        assert_eq!(harvest.capacity(), usize::MAX);
    }

    #[test]
    fn test_entry_writes_both_encodings() {
        let mut harvest = HarvestErrorBuffer::new(1);
        merge_txn_errors(&mut harvest, &txn_with(&["oops"]), &summary("WebTransaction/Go/e"));
        let entry = &harvest.entries()[0];

        let mut traced = Vec::new();
        entry.write_traced(&mut traced).unwrap();
        let traced: serde_json::Value = serde_json::from_slice(&traced).unwrap();
        assert_eq!(traced[1], "WebTransaction/Go/e");
        assert_eq!(traced[2], "oops");

        let mut event = Vec::new();
        entry.write_event(&mut event).unwrap();
        let event: serde_json::Value = serde_json::from_slice(&event).unwrap();
        assert_eq!(event[0]["type"], "TransactionError");
        assert_eq!(event[0]["error.message"], "oops");
        assert_eq!(event[0]["transactionName"], "WebTransaction/Go/e");
    }

    #[test]
    fn test_merge_empty_txn_is_noop() {
        let harvest = ErrorHarvest::new(2);
        assert_eq!(harvest.merge(&TransactionErrorBuffer::new(5), &summary("t")), 0);
        assert!(harvest.is_empty());
    }

    #[test]
    fn test_poisoned_lock_still_usable() {
        let harvest = Arc::new(ErrorHarvest::new(4));
        let poisoner = Arc::clone(&harvest);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.current.lock().unwrap();
            panic!("poison the harvest lock");
        })
        .join();

        assert_eq!(harvest.merge(&txn_with(&["after"]), &summary("t")), 1);
        assert_eq!(harvest.swap().len(), 1);
    }
}
