use crate::result::ProbeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of transition an [`Event`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// The endpoint started being monitored.
    Start,
    /// The endpoint passed all of its conditions after previously failing.
    Healthy,
    /// The endpoint failed one or more conditions after previously passing.
    Unhealthy,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Start => write!(f, "START"),
            EventType::Healthy => write!(f, "HEALTHY"),
            EventType::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(EventType::Start),
            "HEALTHY" => Ok(EventType::Healthy),
            "UNHEALTHY" => Ok(EventType::Unhealthy),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// A state transition in an endpoint's history.
///
/// Events record transitions only, not every result: START once, then
/// HEALTHY/UNHEALTHY each time the overall success flag flips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates the transition event corresponding to a result's outcome.
    pub fn from_result(result: &ProbeResult) -> Self {
        Self {
            event_type: if result.success {
                EventType::Healthy
            } else {
                EventType::Unhealthy
            },
            timestamp: result.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_strings() {
        for event_type in [EventType::Start, EventType::Healthy, EventType::Unhealthy] {
            assert_eq!(event_type.to_string().parse::<EventType>(), Ok(event_type));
        }
        assert!("BOGUS".parse::<EventType>().is_err());
    }

    #[test]
    fn from_result_maps_success_to_healthy() {
        let mut result = ProbeResult::new();
        result.success = true;
        assert_eq!(Event::from_result(&result).event_type, EventType::Healthy);
        result.success = false;
        assert_eq!(Event::from_result(&result).event_type, EventType::Unhealthy);
    }
}
