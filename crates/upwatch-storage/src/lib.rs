//! SQL-backed persistence and retention for monitoring data.
//!
//! The default implementation ([`sql::SqlStore`]) uses a single SQLite
//! database in WAL mode with one writer connection; every multi-statement
//! mutation runs inside one transaction, and storage stays bounded through
//! batched row compaction plus hourly-to-daily uptime rollup merges.

pub mod error;
pub mod sql;

mod cache;


use chrono::{DateTime, Utc};
use error::Result;
use std::collections::BTreeMap;
use upwatch_alert::Alert;
use upwatch_core::{Endpoint, EndpointStatus, ProbeResult, Suite, SuiteResult, SuiteStatus};

/// Maximum number of results kept per endpoint.
pub const MAXIMUM_NUMBER_OF_RESULTS: i64 = 100;

/// Maximum number of transition events kept per endpoint.
pub const MAXIMUM_NUMBER_OF_EVENTS: i64 = 50;

/// Maximum number of results kept per suite.
pub const MAXIMUM_NUMBER_OF_SUITE_RESULTS: i64 = 100;

/// Which page of events and results to read back.
///
/// Pages are 1-based; a page size of zero skips that section entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingParams {
    pub events_page: u32,
    pub events_page_size: u32,
    pub results_page: u32,
    pub results_page_size: u32,
}

impl PagingParams {
    pub fn with_events(mut self, page: u32, page_size: u32) -> Self {
        self.events_page = page;
        self.events_page_size = page_size;
        self
    }

    pub fn with_results(mut self, page: u32, page_size: u32) -> Self {
        self.results_page = page;
        self.results_page_size = page_size;
        self
    }
}

/// Persisted state of a triggered alert, keyed by the alert configuration's
/// checksum so restarts neither re-fire nor lose in-flight incidents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredAlert {
    pub resolve_key: Option<String>,
    pub number_of_successes_in_a_row: u32,
}

/// Durable store of endpoints, events, results, uptime rollups and
/// triggered alerts.
///
/// Implementations must be safe to share across the per-endpoint monitoring
/// loops (`Send + Sync`); all mutation is transaction-scoped internally.
pub trait Store: Send + Sync {
    /// Persists the observed result for the specified endpoint, along with
    /// its derived transition event and uptime rollup, and performs
    /// opportunistic retention cleanups.
    fn insert_endpoint_result(&self, endpoint: &Endpoint, result: &ProbeResult) -> Result<()>;

    /// Returns every monitored endpoint's status with the page of events
    /// and results selected by `params`. Endpoints that only ever appear
    /// inside suites are not listed.
    fn get_all_endpoint_statuses(&self, params: &PagingParams) -> Result<Vec<EndpointStatus>>;

    /// Returns the status for the endpoint identified by group and name.
    fn get_endpoint_status(
        &self,
        group: &str,
        name: &str,
        params: &PagingParams,
    ) -> Result<EndpointStatus>;

    /// Returns the status for the endpoint identified by its key.
    fn get_endpoint_status_by_key(&self, key: &str, params: &PagingParams)
        -> Result<EndpointStatus>;

    /// Returns the uptime fraction (0..=1) over a time range. Returns 0
    /// when no data exists in the range.
    fn get_uptime_by_key(&self, key: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<f64>;

    /// Returns the average response time in milliseconds over a time range,
    /// or 0 when no data exists in the range.
    fn get_average_response_time_by_key(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64>;

    /// Returns the average response time in milliseconds per hourly bucket
    /// (keyed by the bucket's unix timestamp) over a time range.
    fn get_hourly_average_response_times_by_key(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<i64, i64>>;

    /// Removes every endpoint whose key is not in `keys`, cascading to its
    /// events, results, uptimes and triggered alerts. An empty list removes
    /// everything. Returns the number of endpoints removed.
    fn delete_all_endpoint_statuses_not_in_keys(&self, keys: &[String]) -> usize;

    /// Returns the persisted trigger state for the given alert, if any.
    fn get_triggered_endpoint_alert(
        &self,
        endpoint: &Endpoint,
        alert: &Alert,
    ) -> Result<Option<TriggeredAlert>>;

    /// Inserts or updates the persisted trigger state for an alert.
    fn upsert_triggered_endpoint_alert(
        &self,
        endpoint: &Endpoint,
        alert: &Alert,
        number_of_successes_in_a_row: u32,
    ) -> Result<()>;

    /// Deletes the persisted trigger state for an alert.
    fn delete_triggered_endpoint_alert(&self, endpoint: &Endpoint, alert: &Alert) -> Result<()>;

    /// Deletes persisted trigger states whose configuration checksum is not
    /// in `checksums`, so state belonging to removed or modified alert
    /// configurations does not linger. Returns the number removed.
    fn delete_all_triggered_alerts_not_in_checksums_by_endpoint(
        &self,
        endpoint: &Endpoint,
        checksums: &[String],
    ) -> usize;

    /// Persists a suite execution result, linking each contained endpoint
    /// result to the suite result row.
    fn insert_suite_result(&self, suite: &Suite, result: &SuiteResult) -> Result<()>;

    /// Returns every monitored suite's status with the page of results
    /// selected by `params`.
    fn get_all_suite_statuses(&self, params: &PagingParams) -> Result<Vec<SuiteStatus>>;

    /// Returns the status for the suite identified by its key.
    fn get_suite_status_by_key(&self, key: &str, params: &PagingParams) -> Result<SuiteStatus>;

    /// Removes every suite whose key is not in `keys`. An empty list
    /// removes everything. Returns the number of suites removed.
    fn delete_all_suite_statuses_not_in_keys(&self, keys: &[String]) -> usize;

    /// Deletes everything from the store.
    fn clear(&self);

    /// Persists pending data, if the implementation buffers any. The SQL
    /// store is immediately durable, so this is a no-op there.
    fn save(&self) -> Result<()>;

    /// Closes the store. Only used before stopping the application.
    fn close(&self);
}

pub use error::StorageError;
pub use sql::SqlStore;
