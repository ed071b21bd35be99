//! Domain model and evaluation engine for upwatch.
//!
//! An [`Endpoint`] is probed through a [`probe::ProbeClient`] collaborator;
//! the produced [`ProbeResult`] is then evaluated against the endpoint's
//! [`Condition`]s, with placeholders (`[STATUS]`, `[BODY].path`,
//! `[RESPONSE_TIME]`, ...) resolved from the result and, for suite runs,
//! from the shared [`upwatch_common::context::SuiteContext`].

pub mod condition;
pub mod duration;
pub mod endpoint;
pub mod event;
pub mod jsonpath;
pub mod placeholder;
pub mod probe;
pub mod result;
pub mod status;
pub mod suite;

pub use condition::Condition;
pub use endpoint::Endpoint;
pub use event::{Event, EventType};
pub use probe::ProbeClient;
pub use result::{ConditionResult, ProbeResult};
pub use status::{EndpointStatus, SuiteStatus};
pub use suite::{Suite, SuiteResult};
