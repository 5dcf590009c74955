//! Agent and user attributes attached to captured errors.
//!
//! Attributes are stored once per transaction with the set of destinations
//! they may be sent to, computed from the configured include/exclude rules.
//! Encoders render them per destination into ordered maps.

use std::collections::BTreeMap;
use std::ops::BitOr;
use std::sync::Arc;

use apm_common::error::invalid_attribute;
use apm_common::{AttributeConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of user attributes per transaction.
pub const MAX_USER_ATTRIBUTES: usize = 64;

/// Maximum attribute key length in bytes.
pub const ATTRIBUTE_KEY_LIMIT: usize = 255;

/// String attribute values are truncated to this many bytes.
pub const ATTRIBUTE_VALUE_LIMIT: usize = 255;

/// Well-known agent attribute names.
pub mod agent_names {
    pub const REQUEST_METHOD: &str = "request.method";
    pub const REQUEST_URI: &str = "request.uri";
    pub const RESPONSE_CODE: &str = "httpResponseCode";
}

/// Attribute name to value, ordered by name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// A single attribute value as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u16> for AttributeValue {
    fn from(v: u16) -> Self {
        AttributeValue::UInt(u64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::UInt(u64::from(v))
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        AttributeValue::UInt(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl AttributeValue {
    fn truncated(self) -> Self {
        match self {
            AttributeValue::String(s) => {
                AttributeValue::String(truncate_string(s, ATTRIBUTE_VALUE_LIMIT))
            }
            other => other,
        }
    }
}

/// Apply the user-attribute key and value limits to per-error extras.
///
/// Keys over [`ATTRIBUTE_KEY_LIMIT`] are dropped; string values are
/// truncated like stored user attributes.
pub(crate) fn limit_extra_attributes(extra: AttributeMap) -> AttributeMap {
    extra
        .into_iter()
        .filter_map(|(name, value)| {
            if name.len() > ATTRIBUTE_KEY_LIMIT {
                debug!(key_len = name.len(), "dropping oversized extra attribute key");
                return None;
            }
            Some((name, value.truncated()))
        })
        .collect()
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_string(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Bitmask of the destinations an attribute may be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DestinationSet(u8);

impl DestinationSet {
    pub const NONE: DestinationSet = DestinationSet(0);
    pub const TXN_EVENT: DestinationSet = DestinationSet(1 << 0);
    pub const ERROR: DestinationSet = DestinationSet(1 << 1);
    pub const TXN_TRACE: DestinationSet = DestinationSet(1 << 2);
    pub const BROWSER: DestinationSet = DestinationSet(1 << 3);
    pub const ALL: DestinationSet = DestinationSet(0b1111);

    pub fn intersects(self, other: DestinationSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn without(self, other: DestinationSet) -> DestinationSet {
        DestinationSet(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DestinationSet {
    type Output = DestinationSet;

    fn bitor(self, rhs: DestinationSet) -> DestinationSet {
        DestinationSet(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    prefix: String,
    wildcard: bool,
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => Pattern {
                prefix: prefix.to_string(),
                wildcard: true,
            },
            None => Pattern {
                prefix: raw.to_string(),
                wildcard: false,
            },
        }
    }

    fn matches(&self, name: &str) -> bool {
        if self.wildcard {
            name.starts_with(&self.prefix)
        } else {
            name == self.prefix
        }
    }

    /// Longer prefixes are more specific; an exact name beats a wildcard of
    /// the same length.
    fn specificity(&self) -> (usize, bool) {
        (self.prefix.len(), !self.wildcard)
    }
}

#[derive(Debug, Clone)]
struct Rules {
    enabled: bool,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Rules {
    fn from_config(config: &AttributeConfig) -> Self {
        Rules {
            enabled: config.enabled,
            include: config.include.iter().map(|p| Pattern::parse(p)).collect(),
            exclude: config.exclude.iter().map(|p| Pattern::parse(p)).collect(),
        }
    }

    fn best_match(patterns: &[Pattern], name: &str) -> Option<(usize, bool)> {
        patterns
            .iter()
            .filter(|p| p.matches(name))
            .map(Pattern::specificity)
            .max()
    }

    /// `Some(true)` keeps, `Some(false)` drops, `None` leaves the decision
    /// to the default.
    fn decide(&self, name: &str) -> Option<bool> {
        if !self.enabled {
            return Some(false);
        }
        match (
            Self::best_match(&self.include, name),
            Self::best_match(&self.exclude, name),
        ) {
            (None, None) => None,
            (Some(_), None) => Some(true),
            (None, Some(_)) => Some(false),
            // exclude wins ties
            (Some(inc), Some(exc)) => Some(inc > exc),
        }
    }
}

/// Decides which destinations an attribute name is sent to.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    global: Rules,
    error: Rules,
}

impl Default for AttributeFilter {
    fn default() -> Self {
        let config = AttributeConfig::default();
        AttributeFilter::new(&config, &config)
    }
}

impl AttributeFilter {
    /// Build from the global rules and the error-destination rules.
    pub fn new(global: &AttributeConfig, error: &AttributeConfig) -> Self {
        AttributeFilter {
            global: Rules::from_config(global),
            error: Rules::from_config(error),
        }
    }

    pub fn destinations(&self, name: &str) -> DestinationSet {
        if self.global.decide(name) == Some(false) {
            return DestinationSet::NONE;
        }
        if self.error.decide(name) == Some(false) {
            return DestinationSet::ALL.without(DestinationSet::ERROR);
        }
        DestinationSet::ALL
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: AttributeValue,
    dests: DestinationSet,
}

/// Attributes collected for one transaction.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    filter: Arc<AttributeFilter>,
    agent: BTreeMap<String, Entry>,
    user: BTreeMap<String, Entry>,
}

impl Attributes {
    pub fn new(filter: Arc<AttributeFilter>) -> Self {
        Attributes {
            filter,
            agent: BTreeMap::new(),
            user: BTreeMap::new(),
        }
    }

    pub fn filter(&self) -> &AttributeFilter {
        &self.filter
    }

    /// Record an agent attribute. Filtered-out names are not stored.
    pub fn add_agent(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let dests = self.filter.destinations(name);
        if dests.is_empty() {
            return;
        }
        self.agent.insert(
            name.to_string(),
            Entry {
                value: value.into().truncated(),
                dests,
            },
        );
    }

    /// Record a user attribute.
    ///
    /// Rejects keys longer than [`ATTRIBUTE_KEY_LIMIT`] and new keys once
    /// [`MAX_USER_ATTRIBUTES`] are stored. Overwriting an existing key is
    /// always allowed.
    pub fn add_user(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        if name.len() > ATTRIBUTE_KEY_LIMIT {
            return Err(invalid_attribute(
                name,
                format!("key exceeds {} bytes", ATTRIBUTE_KEY_LIMIT),
            ));
        }
        if self.user.len() >= MAX_USER_ATTRIBUTES && !self.user.contains_key(name) {
            return Err(invalid_attribute(
                name,
                format!("limit of {} user attributes reached", MAX_USER_ATTRIBUTES),
            ));
        }
        let dests = self.filter.destinations(name);
        if dests.is_empty() {
            return Ok(());
        }
        self.user.insert(
            name.to_string(),
            Entry {
                value: value.into().truncated(),
                dests,
            },
        );
        Ok(())
    }

    /// Agent attributes allowed for `dest`.
    pub fn render_agent(&self, dest: DestinationSet) -> AttributeMap {
        render(&self.agent, dest)
    }

    /// User attributes allowed for `dest`, merged with per-error extras.
    ///
    /// Extras pass through the same filter and replace stored user
    /// attributes of the same name.
    pub fn render_user(&self, dest: DestinationSet, extra: Option<&AttributeMap>) -> AttributeMap {
        let mut out = AttributeMap::new();
        for (name, entry) in &self.user {
            if !entry.dests.intersects(dest) {
                continue;
            }
            if extra.is_some_and(|e| e.contains_key(name)) {
                continue;
            }
            out.insert(name.clone(), entry.value.clone());
        }
        for (name, value) in extra.into_iter().flatten() {
            if self.filter.destinations(name).intersects(dest) {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }
}

fn render(entries: &BTreeMap<String, Entry>, dest: DestinationSet) -> AttributeMap {
    entries
        .iter()
        .filter(|(_, e)| e.dests.intersects(dest))
        .map(|(k, e)| (k.clone(), e.value.clone()))
        .collect()
}
