use crate::event::Event;
use crate::result::ProbeResult;
use serde::{Deserialize, Serialize};
use upwatch_common::key::convert_group_and_name_to_key;

/// A page of an endpoint's history: recent results and transition events.
///
/// This is the read-side DTO served by the storage engine to the query
/// APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub name: String,
    pub group: String,
    pub key: String,
    pub results: Vec<ProbeResult>,
    pub events: Vec<Event>,
}

impl EndpointStatus {
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            key: convert_group_and_name_to_key(group, name),
            results: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// A page of a suite's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteStatus {
    pub name: String,
    pub group: String,
    pub key: String,
    pub results: Vec<crate::suite::SuiteResult>,
}

impl SuiteStatus {
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            key: convert_group_and_name_to_key(group, name),
            results: Vec::new(),
        }
    }
}
