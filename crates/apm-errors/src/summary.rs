//! Transaction context paired with each harvested error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::attributes::{AttributeMap, Attributes, DestinationSet};

/// What the encoders need to know about the transaction an error came from.
pub trait TransactionSummary: fmt::Debug + Send + Sync {
    /// Final transaction name, e.g. `WebTransaction/Go/checkout`.
    fn final_name(&self) -> &str;

    /// Agent attributes allowed for `dest`.
    fn agent_attributes(&self, dest: DestinationSet) -> AttributeMap;

    /// User attributes allowed for `dest`, merged with an error's extra
    /// attributes.
    fn user_attributes(&self, dest: DestinationSet, extra: Option<&AttributeMap>) -> AttributeMap;

    /// Timing and synthetics data rendered as intrinsics.
    fn intrinsics(&self) -> &TxnIntrinsics;
}

/// Summary handle shared by every error of one transaction.
pub type SharedSummary = Arc<dyn TransactionSummary>;

/// Call count and cumulative time for one kind of outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallStats {
    pub call_count: u64,
    pub duration: Duration,
}

/// Identifiers of a synthetic-monitoring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthetics {
    pub resource_id: String,
    pub job_id: String,
    pub monitor_id: String,
}

/// Transaction-level intrinsic values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TxnIntrinsics {
    /// Wall-clock duration of the transaction.
    pub duration: Duration,
    /// Time spent across all threads; equals `duration` for synchronous work.
    pub total_time: Duration,
    /// Time between the front-end proxy and the application.
    pub queuing: Option<Duration>,
    pub external: Option<CallStats>,
    pub datastore: Option<CallStats>,
    pub synthetics: Option<Synthetics>,
}

/// Concrete summary of a finished transaction.
#[derive(Debug, Clone)]
pub struct TxnEvent {
    final_name: String,
    start: DateTime<Utc>,
    intrinsics: TxnIntrinsics,
    attributes: Attributes,
}

impl TxnEvent {
    pub fn new(final_name: impl Into<String>, start: DateTime<Utc>, duration: Duration) -> Self {
        TxnEvent {
            final_name: final_name.into(),
            start,
            intrinsics: TxnIntrinsics {
                duration,
                total_time: duration,
                ..TxnIntrinsics::default()
            },
            attributes: Attributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_total_time(mut self, total_time: Duration) -> Self {
        self.intrinsics.total_time = total_time;
        self
    }

    pub fn with_queuing(mut self, queuing: Duration) -> Self {
        self.intrinsics.queuing = Some(queuing);
        self
    }

    pub fn with_external(mut self, call_count: u64, duration: Duration) -> Self {
        self.intrinsics.external = Some(CallStats {
            call_count,
            duration,
        });
        self
    }

    pub fn with_datastore(mut self, call_count: u64, duration: Duration) -> Self {
        self.intrinsics.datastore = Some(CallStats {
            call_count,
            duration,
        });
        self
    }

    pub fn with_synthetics(mut self, synthetics: Synthetics) -> Self {
        self.intrinsics.synthetics = Some(synthetics);
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_shared(self) -> SharedSummary {
        Arc::new(self)
    }
}

impl TransactionSummary for TxnEvent {
    fn final_name(&self) -> &str {
        &self.final_name
    }

    fn agent_attributes(&self, dest: DestinationSet) -> AttributeMap {
        self.attributes.render_agent(dest)
    }

    fn user_attributes(&self, dest: DestinationSet, extra: Option<&AttributeMap>) -> AttributeMap {
        self.attributes.render_user(dest, extra)
    }

    fn intrinsics(&self) -> &TxnIntrinsics {
        &self.intrinsics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;

    #[test]
    fn test_new_sets_total_time_to_duration() {
        let event =
            TxnEvent::new("WebTransaction/Go/hello", Utc::now(), Duration::from_millis(250));
        assert_eq!(event.intrinsics().duration, Duration::from_millis(250));
        assert_eq!(event.intrinsics().total_time, Duration::from_millis(250));
        assert!(event.intrinsics().queuing.is_none());
    }

    #[test]
    fn test_summary_renders_through_attributes() {
        let mut attrs = Attributes::default();
        attrs.add_agent("request.method", "POST");
        attrs.add_user("customer", "acme").unwrap();

        let summary = TxnEvent::new("WebTransaction/Go/orders", Utc::now(), Duration::ZERO)
            .with_attributes(attrs)
            .into_shared();

        assert_eq!(summary.final_name(), "WebTransaction/Go/orders");
        assert_eq!(
            summary.agent_attributes(DestinationSet::ERROR)["request.method"],
            AttributeValue::from("POST")
        );
        let mut extra = AttributeMap::new();
        extra.insert("attempt".to_string(), AttributeValue::from(2));
        let user = summary.user_attributes(DestinationSet::ERROR, Some(&extra));
        assert_eq!(user.len(), 2);
    }
}
