//! Per-transaction error buffer.

use crate::record::ErrorRecord;

/// Records reserved up front; larger buffers grow on demand.
pub(crate) const PREALLOCATED_RECORDS: usize = 16;

/// Errors captured during one transaction.
///
/// Capacity is fixed at construction. Records past capacity are dropped
/// without any signal to the caller; the earliest records are the ones kept.
#[derive(Debug, Clone)]
pub struct TransactionErrorBuffer {
    records: Vec<ErrorRecord>,
    max: usize,
    dropped: usize,
}

impl TransactionErrorBuffer {
    /// Create an empty buffer. A `max` of zero disables capture.
    pub fn new(max: usize) -> Self {
        TransactionErrorBuffer {
            records: Vec::with_capacity(max.min(PREALLOCATED_RECORDS)),
            max,
            dropped: 0,
        }
    }

    /// Append `record` if there is room, otherwise drop it.
    pub fn add(&mut self, record: ErrorRecord) {
        if self.records.len() < self.max {
            self.records.push(record);
        } else {
            self.dropped += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Number of records refused because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a TransactionErrorBuffer {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(msg: &str) -> ErrorRecord {
        ErrorRecord::new(Utc::now(), msg, "Error")
    }

    #[test]
    fn test_keeps_first_records_in_order() {
        let mut buf = TransactionErrorBuffer::new(2);
        for msg in ["a", "b", "c", "d"] {
            buf.add(record(msg));
        }
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.dropped(), 2);
        let messages: Vec<&str> = buf.iter().map(ErrorRecord::message).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn test_huge_limit_does_not_preallocate() {
        let mut buf = TransactionErrorBuffer::new(usize::MAX);
        buf.add(record("only"));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), usize::MAX);
    }

    #[test]
    fn test_zero_capacity_accepts_nothing() {
        let mut buf = TransactionErrorBuffer::new(0);
        buf.add(record("ignored"));
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 0);
        assert_eq!(buf.dropped(), 1);
    }

    #[test]
    fn test_under_capacity_keeps_all() {
        let mut buf = TransactionErrorBuffer::new(5);
        buf.add(record("only"));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.dropped(), 0);
        assert_eq!(buf.records()[0].message(), "only");
    }
}
