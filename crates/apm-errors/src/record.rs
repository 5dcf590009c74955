//! Captured error records.
//!
//! An [`ErrorRecord`] is built once and never mutated afterwards; buffers
//! only ever add or drop whole records.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{limit_extra_attributes, AttributeMap};

/// Error class used for errors produced by recovering a panic.
pub const PANIC_ERROR_CLASS: &str = "panic";

/// Rendering used for panic payloads of an unknown type.
const OPAQUE_PANIC_PAYLOAD: &str = "Box<dyn Any>";

/// Ordered stack frames, outermost last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackTrace(Vec<String>);

impl StackTrace {
    pub fn new(frames: Vec<String>) -> Self {
        StackTrace(frames)
    }

    pub fn frames(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for StackTrace {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StackTrace(iter.into_iter().map(Into::into).collect())
    }
}

/// One captured error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    when: DateTime<Utc>,
    message: String,
    class: String,
    stack: Option<StackTrace>,
    extra_attributes: Option<AttributeMap>,
}

impl ErrorRecord {
    /// Record an error with an explicit class.
    pub fn new(when: DateTime<Utc>, message: impl Into<String>, class: impl Into<String>) -> Self {
        ErrorRecord {
            when,
            message: message.into(),
            class: class.into(),
            stack: None,
            extra_attributes: None,
        }
    }

    /// Record a recovered panic.
    ///
    /// String payloads and boxed errors supply the message directly; other
    /// payloads get a generic rendering.
    pub fn from_fault(when: DateTime<Utc>, payload: &(dyn Any + Send)) -> Self {
        ErrorRecord::new(when, fault_message(payload), PANIC_ERROR_CLASS)
    }

    /// Record an error value under the panic class.
    pub fn from_error(when: DateTime<Utc>, err: &dyn StdError) -> Self {
        ErrorRecord::new(when, err.to_string(), PANIC_ERROR_CLASS)
    }

    /// Record an HTTP response code.
    ///
    /// The class is the decimal code; the message is the standard reason
    /// phrase, empty for unknown codes.
    pub fn from_status_code(when: DateTime<Utc>, code: u16) -> Self {
        ErrorRecord::new(when, status_text(code), code.to_string())
    }

    pub fn with_stack_trace(mut self, stack: StackTrace) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Attach per-error user attributes.
    ///
    /// Keys longer than 255 bytes are dropped and string values are
    /// truncated to 255 bytes, matching transaction user attributes.
    pub fn with_extra_attributes(mut self, attrs: AttributeMap) -> Self {
        self.extra_attributes = Some(limit_extra_attributes(attrs));
        self
    }

    pub fn when(&self) -> DateTime<Utc> {
        self.when
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack.as_ref()
    }

    pub fn extra_attributes(&self) -> Option<&AttributeMap> {
        self.extra_attributes.as_ref()
    }
}

/// Standard reason phrase for an HTTP status code, or `""`.
pub fn status_text(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

fn fault_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
        return err.to_string();
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send>>() {
        return err.to_string();
    }
    display_primitive(payload).unwrap_or_else(|| OPAQUE_PANIC_PAYLOAD.to_string())
}

fn display_primitive(payload: &(dyn Any + Send)) -> Option<String> {
    fn show<T: fmt::Display + 'static>(payload: &(dyn Any + Send)) -> Option<String> {
        payload.downcast_ref::<T>().map(ToString::to_string)
    }

    show::<i32>(payload)
        .or_else(|| show::<i64>(payload))
        .or_else(|| show::<u32>(payload))
        .or_else(|| show::<u64>(payload))
        .or_else(|| show::<usize>(payload))
        .or_else(|| show::<f64>(payload))
        .or_else(|| show::<bool>(payload))
        .or_else(|| show::<char>(payload))
}
