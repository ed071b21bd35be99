//! Typed key/value state shared between the endpoints of a suite.
//!
//! Values extracted from one endpoint's result (via `store` directives) are
//! visible to every subsequent endpoint in the same suite run, both in
//! conditions (`[CONTEXT].key`) and in request preprocessing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

/// Error returned when a context path cannot be resolved.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context path not found: {0}")]
    PathNotFound(String),

    #[error("context path cannot be empty")]
    EmptyPath,
}

/// A value stored in a [`SuiteContext`].
///
/// Stored values are typed rather than kept as strings so that downstream
/// consumers can match exhaustively instead of re-sniffing at every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ContextValue {
    /// Parses a resolved placeholder string into its most specific type:
    /// integer, then float, then boolean, then string.
    ///
    /// ```
    /// use upwatch_common::context::ContextValue;
    ///
    /// assert_eq!(ContextValue::parse("42"), ContextValue::Int(42));
    /// assert_eq!(ContextValue::parse("4.5"), ContextValue::Float(4.5));
    /// assert_eq!(ContextValue::parse("true"), ContextValue::Bool(true));
    /// assert_eq!(ContextValue::parse("on"), ContextValue::String("on".to_string()));
    /// ```
    pub fn parse(s: &str) -> ContextValue {
        if let Ok(i) = s.parse::<i64>() {
            return ContextValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return ContextValue::Float(f);
        }
        if let Ok(b) = s.parse::<bool>() {
            return ContextValue::Bool(b);
        }
        ContextValue::String(s.to_string())
    }

    /// Length as reported by the `len()` condition function.
    pub fn len(&self) -> usize {
        match self {
            ContextValue::String(s) => s.len(),
            other => other.to_string().len(),
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Int(i) => write!(f, "{i}"),
            ContextValue::Float(v) => write!(f, "{v}"),
            ContextValue::Bool(b) => write!(f, "{b}"),
            ContextValue::String(s) => write!(f, "{s}"),
        }
    }
}

/// Shared context for one suite execution.
///
/// Keys are dotted paths (`user.id`), stored flat: the condition grammar
/// only ever addresses a leaf by its full path, so nothing is gained by
/// materializing intermediate maps. Reads and writes are interleaved by the
/// sequential suite loop, but the context is also snapshotted into the suite
/// result at the end of the run, so access is guarded.
pub struct SuiteContext {
    values: RwLock<BTreeMap<String, ContextValue>>,
}

impl SuiteContext {
    /// Creates a context seeded with the given initial values.
    pub fn new(initial: BTreeMap<String, ContextValue>) -> Self {
        Self {
            values: RwLock::new(initial),
        }
    }

    /// Retrieves the value stored at `path`.
    pub fn get(&self, path: &str) -> Result<ContextValue, ContextError> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values
            .get(path)
            .cloned()
            .ok_or_else(|| ContextError::PathNotFound(path.to_string()))
    }

    /// Stores `value` at `path`, replacing any previous value.
    pub fn set(&self, path: &str, value: ContextValue) -> Result<(), ContextError> {
        if path.is_empty() {
            return Err(ContextError::EmptyPath);
        }
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(path.to_string(), value);
        Ok(())
    }

    /// Returns a copy of all values, used to snapshot the final context into
    /// a suite result.
    pub fn snapshot(&self) -> BTreeMap<String, ContextValue> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for SuiteContext {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}
