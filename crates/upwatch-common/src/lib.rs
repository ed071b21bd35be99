//! Shared leaf primitives used across the upwatch workspace.
//!
//! This crate deliberately has no dependency on the domain model: it holds
//! the key sanitization used to derive stable endpoint/suite identifiers,
//! the wildcard matcher backing `pat(...)` conditions, and the typed
//! key/value context shared between endpoints of a suite.

pub mod context;
pub mod key;
pub mod pattern;
