//! SQLite-backed [`Store`] implementation.

use crate::cache::StatusCache;
use crate::error::{Result, StorageError};
use crate::{
    PagingParams, Store, TriggeredAlert, MAXIMUM_NUMBER_OF_EVENTS, MAXIMUM_NUMBER_OF_RESULTS,
    MAXIMUM_NUMBER_OF_SUITE_RESULTS,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use upwatch_alert::Alert;
use upwatch_core::{
    Endpoint, EndpointStatus, Event, EventType, ProbeResult, Suite, SuiteResult, SuiteStatus,
};
use upwatch_core::result::ConditionResult;
use upwatch_common::key::convert_group_and_name_to_key;

//////////////////////////////////////////////////////////////////////////////
// Note that only the public Store methods in this file may create, commit, //
// or roll back a transaction; helpers always receive an open handle.       //
//////////////////////////////////////////////////////////////////////////////

const EVENTS_CLEANUP_THRESHOLD: i64 = MAXIMUM_NUMBER_OF_EVENTS + 10;
const RESULTS_CLEANUP_THRESHOLD: i64 = MAXIMUM_NUMBER_OF_RESULTS + 10;
const SUITE_RESULTS_CLEANUP_THRESHOLD: i64 = MAXIMUM_NUMBER_OF_SUITE_RESULTS + 10;

/// Number of uptime rows an endpoint may accumulate before hourly entries
/// old enough are merged into daily entries.
const UPTIME_TOTAL_ENTRIES_MERGE_THRESHOLD: i64 = 100;

/// Hourly entries younger than this stay hourly so that 24h uptime windows
/// are computed from full-resolution buckets.
const UPTIME_HOURLY_BUFFER_SECONDS: i64 = 48 * 3600;

/// Minimum span of uptime history that must be retained.
const UPTIME_RETENTION_SECONDS: i64 = 30 * 24 * 3600;

/// Oldest-entry age past which a purge of expired uptime rows is attempted.
/// Normally the merge takes care of this, but a temporarily stopped process
/// can leave entries behind.
const UPTIME_AGE_CLEANUP_THRESHOLD_SECONDS: i64 = 32 * 24 * 3600;

const CACHE_TTL: Duration = Duration::from_secs(600);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS endpoints (
    endpoint_id    INTEGER PRIMARY KEY,
    endpoint_key   TEXT UNIQUE NOT NULL,
    endpoint_name  TEXT NOT NULL,
    endpoint_group TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS endpoint_events (
    endpoint_event_id INTEGER PRIMARY KEY,
    endpoint_id       INTEGER NOT NULL REFERENCES endpoints(endpoint_id) ON DELETE CASCADE,
    event_type        TEXT NOT NULL,
    event_timestamp   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS suites (
    suite_id    INTEGER PRIMARY KEY,
    suite_key   TEXT UNIQUE NOT NULL,
    suite_name  TEXT NOT NULL,
    suite_group TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS suite_results (
    suite_result_id INTEGER PRIMARY KEY,
    suite_id        INTEGER NOT NULL REFERENCES suites(suite_id) ON DELETE CASCADE,
    success         INTEGER NOT NULL,
    timestamp       INTEGER NOT NULL,
    duration        INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS suite_result_errors (
    suite_result_error_id INTEGER PRIMARY KEY,
    suite_result_id       INTEGER NOT NULL REFERENCES suite_results(suite_result_id) ON DELETE CASCADE,
    error                 TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS endpoint_results (
    endpoint_result_id     INTEGER PRIMARY KEY,
    endpoint_id            INTEGER NOT NULL REFERENCES endpoints(endpoint_id) ON DELETE CASCADE,
    success                INTEGER NOT NULL,
    connected              INTEGER NOT NULL,
    status                 INTEGER NOT NULL,
    dns_rcode              TEXT NOT NULL,
    certificate_expiration INTEGER NOT NULL,
    domain_expiration      INTEGER NOT NULL,
    hostname               TEXT NOT NULL,
    ip                     TEXT NOT NULL,
    duration               INTEGER NOT NULL,
    timestamp              INTEGER NOT NULL,
    suite_result_id        INTEGER REFERENCES suite_results(suite_result_id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS endpoint_result_errors (
    endpoint_result_error_id INTEGER PRIMARY KEY,
    endpoint_result_id       INTEGER NOT NULL REFERENCES endpoint_results(endpoint_result_id) ON DELETE CASCADE,
    error                    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS endpoint_result_conditions (
    endpoint_result_condition_id INTEGER PRIMARY KEY,
    endpoint_result_id           INTEGER NOT NULL REFERENCES endpoint_results(endpoint_result_id) ON DELETE CASCADE,
    condition                    TEXT NOT NULL,
    success                      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS endpoint_uptimes (
    endpoint_uptime_id    INTEGER PRIMARY KEY,
    endpoint_id           INTEGER NOT NULL REFERENCES endpoints(endpoint_id) ON DELETE CASCADE,
    hour_unix_timestamp   INTEGER NOT NULL,
    total_executions      INTEGER NOT NULL,
    successful_executions INTEGER NOT NULL,
    total_response_time   INTEGER NOT NULL,
    UNIQUE(endpoint_id, hour_unix_timestamp)
);
CREATE TABLE IF NOT EXISTS endpoint_alerts_triggered (
    endpoint_alert_trigger_id    INTEGER PRIMARY KEY,
    endpoint_id                  INTEGER NOT NULL REFERENCES endpoints(endpoint_id) ON DELETE CASCADE,
    configuration_checksum       TEXT NOT NULL,
    resolve_key                  TEXT NOT NULL,
    number_of_successes_in_a_row INTEGER NOT NULL,
    UNIQUE(endpoint_id, configuration_checksum)
);
CREATE INDEX IF NOT EXISTS idx_endpoint_results_endpoint
    ON endpoint_results(endpoint_id, endpoint_result_id);
CREATE INDEX IF NOT EXISTS idx_endpoint_uptimes_endpoint_hour
    ON endpoint_uptimes(endpoint_id, hour_unix_timestamp);
";

/// Store backed by a single SQLite database.
///
/// The database runs in WAL mode with exactly one writer connection shared
/// behind a mutex, which serializes all writes process-wide and keeps the
/// driver clear of "database is locked" failures.
pub struct SqlStore {
    connection: Mutex<Connection>,

    /// Pre-emptively caches status reads as writes happen. `None` when
    /// caching is disabled.
    cache: Option<StatusCache>,
}

impl SqlStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    pub fn new(path: &str, caching: bool) -> Result<SqlStore> {
        if path.is_empty() {
            return Err(StorageError::Other("path cannot be empty".to_string()));
        }
        let connection = Connection::open(path)?;
        connection.execute_batch(
            "PRAGMA foreign_keys=ON; PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;",
        )?;
        let store = SqlStore {
            connection: Mutex::new(connection),
            cache: caching.then(|| StatusCache::new(CACHE_TTL)),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Creates any missing table or index. Every statement is idempotent,
    /// so this doubles as the repair path for a damaged store: tables that
    /// survived keep their data.
    pub fn create_schema(&self) -> Result<()> {
        self.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for SqlStore {
    fn insert_endpoint_result(&self, endpoint: &Endpoint, result: &ProbeResult) -> Result<()> {
        let key = endpoint.key();
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let endpoint_id = match get_or_insert_endpoint_id(&tx, &key, &endpoint.name, &endpoint.group)
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to retrieve id of endpoint");
                let _ = tx.rollback();
                return Err(e);
            }
        };
        // A transition event is needed when this is the very first result
        // (START plus the initial HEALTHY/UNHEALTHY) or when the success
        // flag flipped compared to the previous result.
        let number_of_events = match count_rows(&tx, "endpoint_events", endpoint_id) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to count events");
                0
            }
        };
        if number_of_events == 0 {
            let start_event = Event {
                event_type: EventType::Start,
                timestamp: result.timestamp - chrono::Duration::milliseconds(50),
            };
            if let Err(e) = insert_endpoint_event(&tx, endpoint_id, &start_event) {
                tracing::warn!(key = %key, error = %e, "Failed to insert START event");
            }
            if let Err(e) = insert_endpoint_event(&tx, endpoint_id, &Event::from_result(result)) {
                tracing::warn!(key = %key, error = %e, "Failed to insert initial event");
            }
        } else {
            match get_last_result_success(&tx, endpoint_id) {
                Ok(last_success) => {
                    if last_success != result.success {
                        let event = Event::from_result(result);
                        if let Err(e) = insert_endpoint_event(&tx, endpoint_id, &event) {
                            tracing::warn!(key = %key, event = %event.event_type, error = %e, "Failed to insert event");
                        }
                    }
                }
                // Without the previous outcome there is no way to decide
                // whether the state flipped; skip only the comparison and
                // let the next insert re-synchronize event state.
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to retrieve outcome of previous result");
                }
            }
            if number_of_events > EVENTS_CLEANUP_THRESHOLD {
                if let Err(e) = delete_old_endpoint_events(&tx, endpoint_id) {
                    tracing::warn!(key = %key, error = %e, "Failed to delete old events");
                }
            }
        }
        // The result row is the source of truth the derived state depends
        // on; failing to insert it aborts the whole transaction.
        if let Err(e) = insert_endpoint_result_row(&tx, endpoint_id, result, None) {
            tracing::error!(key = %key, error = %e, "Failed to insert result");
            let _ = tx.rollback();
            return Err(e);
        }
        match count_rows(&tx, "endpoint_results", endpoint_id) {
            Ok(n) if n > RESULTS_CLEANUP_THRESHOLD => {
                if let Err(e) = delete_old_endpoint_results(&tx, endpoint_id) {
                    tracing::warn!(key = %key, error = %e, "Failed to delete old results");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to count results"),
        }
        // Uptime outlives results by far, so it cannot be derived from them.
        if let Err(e) = update_endpoint_uptime(&tx, endpoint_id, result) {
            tracing::warn!(key = %key, error = %e, "Failed to update uptime");
        }
        match count_rows(&tx, "endpoint_uptimes", endpoint_id) {
            Ok(n) if n >= UPTIME_TOTAL_ENTRIES_MERGE_THRESHOLD => {
                tracing::debug!(key = %key, "Merging hourly uptime entries into daily entries");
                if let Err(e) = merge_hourly_uptime_entries_into_daily_entries(&tx, endpoint_id) {
                    tracing::warn!(key = %key, error = %e, "Failed to merge hourly uptime entries");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to count uptime entries"),
        }
        match get_age_of_oldest_uptime_entry(&tx, endpoint_id) {
            Ok(Some(age_seconds)) if age_seconds > UPTIME_AGE_CLEANUP_THRESHOLD_SECONDS => {
                let max_age = Utc::now().timestamp() - (UPTIME_RETENTION_SECONDS + 3600);
                if let Err(e) = delete_old_uptime_entries(&tx, endpoint_id, max_age) {
                    tracing::warn!(key = %key, error = %e, "Failed to delete old uptime entries");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to retrieve oldest uptime entry"),
        }
        // Refresh rather than merely drop cached pages for this endpoint;
        // a failed refresh degrades to a miss, never a stale hit.
        if let Some(cache) = &self.cache {
            for (cache_key, params) in cache.entries_for_endpoint(&key) {
                cache.delete(&cache_key);
                match get_endpoint_status_by_key_tx(&tx, &key, &params) {
                    Ok(status) => cache.set(cache_key, status, params),
                    Err(e) => {
                        tracing::debug!(key = %key, error = %e, "Dropped cache entry instead of refreshing");
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all_endpoint_statuses(&self, params: &PagingParams) -> Result<Vec<EndpointStatus>> {
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let keys = get_all_standalone_endpoint_keys(&tx)?;
        let mut statuses = Vec::with_capacity(keys.len());
        for key in keys {
            match get_endpoint_status_by_key_tx(&tx, &key, params) {
                Ok(status) => statuses.push(status),
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to read endpoint status"),
            }
        }
        tx.commit()?;
        Ok(statuses)
    }

    fn get_endpoint_status(
        &self,
        group: &str,
        name: &str,
        params: &PagingParams,
    ) -> Result<EndpointStatus> {
        self.get_endpoint_status_by_key(&convert_group_and_name_to_key(group, name), params)
    }

    fn get_endpoint_status_by_key(
        &self,
        key: &str,
        params: &PagingParams,
    ) -> Result<EndpointStatus> {
        let cache_key = StatusCache::cache_key(key, params);
        if let Some(cache) = &self.cache {
            if let Some(status) = cache.get(&cache_key) {
                return Ok(status);
            }
        }
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let status = get_endpoint_status_by_key_tx(&tx, key, params)?;
        tx.commit()?;
        if let Some(cache) = &self.cache {
            cache.set(cache_key, status.clone(), *params);
        }
        Ok(status)
    }

    fn get_uptime_by_key(&self, key: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<f64> {
        if from > to {
            return Err(StorageError::InvalidTimeRange);
        }
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let (endpoint_id, _, _) = get_endpoint_id_group_and_name_by_key(&tx, key)?;
        let (total, successful, _) = sum_uptime_entries(&tx, endpoint_id, from, to)?;
        tx.commit()?;
        if total == 0 {
            return Ok(0.0);
        }
        Ok(successful as f64 / total as f64)
    }

    fn get_average_response_time_by_key(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        if from > to {
            return Err(StorageError::InvalidTimeRange);
        }
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let (endpoint_id, _, _) = get_endpoint_id_group_and_name_by_key(&tx, key)?;
        let (total, _, total_response_time) = sum_uptime_entries(&tx, endpoint_id, from, to)?;
        tx.commit()?;
        if total == 0 {
            return Ok(0);
        }
        Ok(total_response_time / total)
    }

    fn get_hourly_average_response_times_by_key(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<i64, i64>> {
        if from > to {
            return Err(StorageError::InvalidTimeRange);
        }
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let (endpoint_id, _, _) = get_endpoint_id_group_and_name_by_key(&tx, key)?;
        let mut statement = tx.prepare_cached(
            "SELECT hour_unix_timestamp, total_executions, total_response_time
             FROM endpoint_uptimes
             WHERE endpoint_id = ?1
               AND total_executions > 0
               AND hour_unix_timestamp >= ?2
               AND hour_unix_timestamp <= ?3",
        )?;
        let rows = statement.query_map(
            params![endpoint_id, from.timestamp(), to.timestamp()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let mut averages = BTreeMap::new();
        for row in rows {
            let (hour, total_executions, total_response_time) = row?;
            averages.insert(hour, total_response_time / total_executions);
        }
        drop(statement);
        tx.commit()?;
        Ok(averages)
    }

    fn delete_all_endpoint_statuses_not_in_keys(&self, keys: &[String]) -> usize {
        let connection = self.lock();
        let deleted = if keys.is_empty() {
            connection.execute("DELETE FROM endpoints", [])
        } else {
            let placeholders = vec!["?"; keys.len()].join(",");
            connection.execute(
                &format!("DELETE FROM endpoints WHERE endpoint_key NOT IN ({placeholders})"),
                params_from_iter(keys.iter()),
            )
        };
        if let Some(cache) = &self.cache {
            // Wiping the whole cache beats hunting down entries that no
            // longer have an owner; this only runs on reconfiguration.
            cache.clear();
        }
        match deleted {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to delete endpoints not in configured keys");
                0
            }
        }
    }

    fn get_triggered_endpoint_alert(
        &self,
        endpoint: &Endpoint,
        alert: &Alert,
    ) -> Result<Option<TriggeredAlert>> {
        let connection = self.lock();
        let row = connection
            .query_row(
                "SELECT resolve_key, number_of_successes_in_a_row
                 FROM endpoint_alerts_triggered
                 WHERE endpoint_id = (SELECT endpoint_id FROM endpoints WHERE endpoint_key = ?1 LIMIT 1)
                   AND configuration_checksum = ?2",
                params![endpoint.key(), alert.checksum()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(resolve_key, successes)| TriggeredAlert {
            resolve_key: (!resolve_key.is_empty()).then_some(resolve_key),
            number_of_successes_in_a_row: successes.max(0) as u32,
        }))
    }

    fn upsert_triggered_endpoint_alert(
        &self,
        endpoint: &Endpoint,
        alert: &Alert,
        number_of_successes_in_a_row: u32,
    ) -> Result<()> {
        let key = endpoint.key();
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let endpoint_id = match get_or_insert_endpoint_id(&tx, &key, &endpoint.name, &endpoint.group)
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to retrieve id of endpoint");
                let _ = tx.rollback();
                return Err(e);
            }
        };
        if let Err(e) = tx.execute(
            "INSERT INTO endpoint_alerts_triggered (endpoint_id, configuration_checksum, resolve_key, number_of_successes_in_a_row)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(endpoint_id, configuration_checksum) DO UPDATE SET
                 resolve_key = excluded.resolve_key,
                 number_of_successes_in_a_row = excluded.number_of_successes_in_a_row",
            params![
                endpoint_id,
                alert.checksum(),
                alert.resolve_key.as_deref().unwrap_or(""),
                number_of_successes_in_a_row,
            ],
        ) {
            tracing::error!(key = %key, error = %e, "Failed to persist triggered alert");
            let _ = tx.rollback();
            return Err(e.into());
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_triggered_endpoint_alert(&self, endpoint: &Endpoint, alert: &Alert) -> Result<()> {
        let connection = self.lock();
        connection.execute(
            "DELETE FROM endpoint_alerts_triggered
             WHERE configuration_checksum = ?1
               AND endpoint_id = (SELECT endpoint_id FROM endpoints WHERE endpoint_key = ?2 LIMIT 1)",
            params![alert.checksum(), endpoint.key()],
        )?;
        Ok(())
    }

    fn delete_all_triggered_alerts_not_in_checksums_by_endpoint(
        &self,
        endpoint: &Endpoint,
        checksums: &[String],
    ) -> usize {
        let connection = self.lock();
        let deleted = if checksums.is_empty() {
            connection.execute(
                "DELETE FROM endpoint_alerts_triggered
                 WHERE endpoint_id = (SELECT endpoint_id FROM endpoints WHERE endpoint_key = ?1 LIMIT 1)",
                params![endpoint.key()],
            )
        } else {
            let placeholders = vec!["?"; checksums.len()].join(",");
            let mut values: Vec<String> = vec![endpoint.key()];
            values.extend(checksums.iter().cloned());
            connection.execute(
                &format!(
                    "DELETE FROM endpoint_alerts_triggered
                     WHERE endpoint_id = (SELECT endpoint_id FROM endpoints WHERE endpoint_key = ?1 LIMIT 1)
                       AND configuration_checksum NOT IN ({placeholders})"
                ),
                params_from_iter(values.iter()),
            )
        };
        match deleted {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key = %endpoint.key(), error = %e, "Failed to delete stale triggered alerts");
                0
            }
        }
    }

    fn insert_suite_result(&self, suite: &Suite, result: &SuiteResult) -> Result<()> {
        let key = suite.key();
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let suite_id = match get_or_insert_suite_id(&tx, &key, &suite.name, &suite.group) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to retrieve id of suite");
                let _ = tx.rollback();
                return Err(e);
            }
        };
        let suite_result_id = match insert_suite_result_row(&tx, suite_id, result) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to insert suite result");
                let _ = tx.rollback();
                return Err(e);
            }
        };
        // Endpoint results produced inside a suite are linked to the suite
        // result row so the standalone endpoint listing can ignore them.
        for endpoint_result in &result.endpoint_results {
            let endpoint_key = convert_group_and_name_to_key(&suite.group, &endpoint_result.name);
            let endpoint_id = match get_or_insert_endpoint_id(
                &tx,
                &endpoint_key,
                &endpoint_result.name,
                &suite.group,
            ) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(key = %endpoint_key, error = %e, "Failed to retrieve id of suite endpoint");
                    let _ = tx.rollback();
                    return Err(e);
                }
            };
            if let Err(e) =
                insert_endpoint_result_row(&tx, endpoint_id, endpoint_result, Some(suite_result_id))
            {
                tracing::error!(key = %endpoint_key, error = %e, "Failed to insert suite endpoint result");
                let _ = tx.rollback();
                return Err(e);
            }
            if let Err(e) = update_endpoint_uptime(&tx, endpoint_id, endpoint_result) {
                tracing::warn!(key = %endpoint_key, error = %e, "Failed to update uptime");
            }
            match count_rows(&tx, "endpoint_results", endpoint_id) {
                Ok(n) if n > RESULTS_CLEANUP_THRESHOLD => {
                    if let Err(e) = delete_old_endpoint_results(&tx, endpoint_id) {
                        tracing::warn!(key = %endpoint_key, error = %e, "Failed to delete old results");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(key = %endpoint_key, error = %e, "Failed to count results"),
            }
        }
        match count_suite_results(&tx, suite_id) {
            Ok(n) if n > SUITE_RESULTS_CLEANUP_THRESHOLD => {
                if let Err(e) = delete_old_suite_results(&tx, suite_id) {
                    tracing::warn!(key = %key, error = %e, "Failed to delete old suite results");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to count suite results"),
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all_suite_statuses(&self, params: &PagingParams) -> Result<Vec<SuiteStatus>> {
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let mut statement = tx.prepare_cached("SELECT suite_key FROM suites ORDER BY suite_key")?;
        let keys: Vec<String> = statement
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(statement);
        let mut statuses = Vec::with_capacity(keys.len());
        for key in keys {
            match get_suite_status_by_key_tx(&tx, &key, params) {
                Ok(status) => statuses.push(status),
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to read suite status"),
            }
        }
        tx.commit()?;
        Ok(statuses)
    }

    fn get_suite_status_by_key(&self, key: &str, params: &PagingParams) -> Result<SuiteStatus> {
        let connection = self.lock();
        let tx = connection.unchecked_transaction()?;
        let status = get_suite_status_by_key_tx(&tx, key, params)?;
        tx.commit()?;
        Ok(status)
    }

    fn delete_all_suite_statuses_not_in_keys(&self, keys: &[String]) -> usize {
        let connection = self.lock();
        let deleted = if keys.is_empty() {
            connection.execute("DELETE FROM suites", [])
        } else {
            let placeholders = vec!["?"; keys.len()].join(",");
            connection.execute(
                &format!("DELETE FROM suites WHERE suite_key NOT IN ({placeholders})"),
                params_from_iter(keys.iter()),
            )
        };
        match deleted {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to delete suites not in configured keys");
                0
            }
        }
    }

    fn clear(&self) {
        let connection = self.lock();
        let _ = connection.execute("DELETE FROM endpoints", []);
        let _ = connection.execute("DELETE FROM suites", []);
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn save(&self) -> Result<()> {
        // Immediately durable; nothing to flush.
        Ok(())
    }

    fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        let connection = self.lock();
        let _ = connection.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

fn get_endpoint_id_by_key(tx: &Transaction<'_>, key: &str) -> Result<i64> {
    tx.query_row(
        "SELECT endpoint_id FROM endpoints WHERE endpoint_key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StorageError::NotFound {
        entity: "endpoint",
        key: key.to_string(),
    })
}

fn get_or_insert_endpoint_id(
    tx: &Transaction<'_>,
    key: &str,
    name: &str,
    group: &str,
) -> Result<i64> {
    match get_endpoint_id_by_key(tx, key) {
        Ok(id) => Ok(id),
        Err(StorageError::NotFound { .. }) => {
            let id = tx.query_row(
                "INSERT INTO endpoints (endpoint_key, endpoint_name, endpoint_group)
                 VALUES (?1, ?2, ?3)
                 RETURNING endpoint_id",
                params![key, name, group],
                |row| row.get(0),
            )?;
            Ok(id)
        }
        Err(e) => Err(e),
    }
}

fn get_endpoint_id_group_and_name_by_key(
    tx: &Transaction<'_>,
    key: &str,
) -> Result<(i64, String, String)> {
    tx.query_row(
        "SELECT endpoint_id, endpoint_group, endpoint_name
         FROM endpoints
         WHERE endpoint_key = ?1
         LIMIT 1",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?
    .ok_or_else(|| StorageError::NotFound {
        entity: "endpoint",
        key: key.to_string(),
    })
}

fn insert_endpoint_event(tx: &Transaction<'_>, endpoint_id: i64, event: &Event) -> Result<()> {
    tx.execute(
        "INSERT INTO endpoint_events (endpoint_id, event_type, event_timestamp) VALUES (?1, ?2, ?3)",
        params![
            endpoint_id,
            event.event_type.to_string(),
            event.timestamp.timestamp_millis()
        ],
    )?;
    Ok(())
}

fn insert_endpoint_result_row(
    tx: &Transaction<'_>,
    endpoint_id: i64,
    result: &ProbeResult,
    suite_result_id: Option<i64>,
) -> Result<()> {
    let endpoint_result_id: i64 = tx.query_row(
        "INSERT INTO endpoint_results (endpoint_id, success, connected, status, dns_rcode,
                                       certificate_expiration, domain_expiration, hostname, ip,
                                       duration, timestamp, suite_result_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         RETURNING endpoint_result_id",
        params![
            endpoint_id,
            result.success,
            result.connected,
            result.http_status,
            result.dns_rcode,
            result.certificate_expiration.as_millis() as i64,
            result.domain_expiration.as_millis() as i64,
            result.hostname,
            result.ip,
            result.duration.as_millis() as i64,
            result.timestamp.timestamp_millis(),
            suite_result_id,
        ],
        |row| row.get(0),
    )?;
    let mut statement = tx.prepare_cached(
        "INSERT INTO endpoint_result_errors (endpoint_result_id, error) VALUES (?1, ?2)",
    )?;
    for error in &result.errors {
        statement.execute(params![endpoint_result_id, error])?;
    }
    let mut statement = tx.prepare_cached(
        "INSERT INTO endpoint_result_conditions (endpoint_result_id, condition, success)
         VALUES (?1, ?2, ?3)",
    )?;
    for condition_result in &result.condition_results {
        statement.execute(params![
            endpoint_result_id,
            condition_result.condition,
            condition_result.success
        ])?;
    }
    Ok(())
}

fn update_endpoint_uptime(tx: &Transaction<'_>, endpoint_id: i64, result: &ProbeResult) -> Result<()> {
    let hour_unix_timestamp = result.timestamp.timestamp() / 3600 * 3600;
    tx.execute(
        "INSERT INTO endpoint_uptimes (endpoint_id, hour_unix_timestamp, total_executions,
                                       successful_executions, total_response_time)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(endpoint_id, hour_unix_timestamp) DO UPDATE SET
             total_executions = excluded.total_executions + endpoint_uptimes.total_executions,
             successful_executions = excluded.successful_executions + endpoint_uptimes.successful_executions,
             total_response_time = excluded.total_response_time + endpoint_uptimes.total_response_time",
        params![
            endpoint_id,
            hour_unix_timestamp,
            1,
            i64::from(result.success),
            result.duration.as_millis() as i64,
        ],
    )?;
    Ok(())
}

fn count_rows(tx: &Transaction<'_>, table: &str, endpoint_id: i64) -> Result<i64> {
    let count = tx.query_row(
        &format!("SELECT COUNT(1) FROM {table} WHERE endpoint_id = ?1"),
        params![endpoint_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn get_last_result_success(tx: &Transaction<'_>, endpoint_id: i64) -> Result<bool> {
    tx.query_row(
        "SELECT success FROM endpoint_results
         WHERE endpoint_id = ?1
         ORDER BY endpoint_result_id DESC
         LIMIT 1",
        params![endpoint_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StorageError::Other("expected a row to be returned, but none was".to_string()))
}

fn delete_old_endpoint_events(tx: &Transaction<'_>, endpoint_id: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM endpoint_events
         WHERE endpoint_id = ?1
           AND endpoint_event_id NOT IN (
               SELECT endpoint_event_id
               FROM endpoint_events
               WHERE endpoint_id = ?1
               ORDER BY endpoint_event_id DESC
               LIMIT ?2
           )",
        params![endpoint_id, MAXIMUM_NUMBER_OF_EVENTS],
    )?;
    Ok(())
}

fn delete_old_endpoint_results(tx: &Transaction<'_>, endpoint_id: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM endpoint_results
         WHERE endpoint_id = ?1
           AND endpoint_result_id NOT IN (
               SELECT endpoint_result_id
               FROM endpoint_results
               WHERE endpoint_id = ?1
               ORDER BY endpoint_result_id DESC
               LIMIT ?2
           )",
        params![endpoint_id, MAXIMUM_NUMBER_OF_RESULTS],
    )?;
    Ok(())
}

fn delete_old_uptime_entries(tx: &Transaction<'_>, endpoint_id: i64, max_age_unix: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM endpoint_uptimes WHERE endpoint_id = ?1 AND hour_unix_timestamp < ?2",
        params![endpoint_id, max_age_unix],
    )?;
    Ok(())
}

fn get_age_of_oldest_uptime_entry(tx: &Transaction<'_>, endpoint_id: i64) -> Result<Option<i64>> {
    let oldest: Option<i64> = tx
        .query_row(
            "SELECT hour_unix_timestamp
             FROM endpoint_uptimes
             WHERE endpoint_id = ?1
             ORDER BY hour_unix_timestamp
             LIMIT 1",
            params![endpoint_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(oldest.map(|timestamp| Utc::now().timestamp() - timestamp))
}

/// Merges hourly uptime entries older than the hourly buffer into one entry
/// per day, and drops entries past the retention floor along the way.
///
/// This bounds uptime storage to roughly 48 hourly entries plus one entry
/// per retained day, independent of probe frequency.
fn merge_hourly_uptime_entries_into_daily_entries(
    tx: &Transaction<'_>,
    endpoint_id: i64,
) -> Result<()> {
    let now = Utc::now();
    let min_threshold = now - chrono::Duration::seconds(UPTIME_HOURLY_BUFFER_SECONDS);
    let min_threshold = Utc
        .with_ymd_and_hms(
            min_threshold.year(),
            min_threshold.month(),
            min_threshold.day(),
            0,
            0,
            0,
        )
        .single()
        .unwrap_or(min_threshold);
    let max_threshold = now - chrono::Duration::seconds(UPTIME_RETENTION_SECONDS);
    let mut statement = tx.prepare_cached(
        "SELECT hour_unix_timestamp, total_executions, successful_executions, total_response_time
         FROM endpoint_uptimes
         WHERE endpoint_id = ?1
           AND hour_unix_timestamp < ?2
           AND hour_unix_timestamp >= ?3",
    )?;
    let rows = statement.query_map(
        params![endpoint_id, min_threshold.timestamp(), max_threshold.timestamp()],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;
    let mut daily_entries: BTreeMap<i64, (i64, i64, i64)> = BTreeMap::new();
    for row in rows {
        let (hour_unix_timestamp, total, successful, response_time) = row?;
        let timestamp = DateTime::from_timestamp(hour_unix_timestamp, 0).unwrap_or_default();
        let day_unix_timestamp = Utc
            .with_ymd_and_hms(timestamp.year(), timestamp.month(), timestamp.day(), 0, 0, 0)
            .single()
            .map(|day| day.timestamp())
            .unwrap_or(hour_unix_timestamp);
        let entry = daily_entries.entry(day_unix_timestamp).or_insert((0, 0, 0));
        entry.0 += total;
        entry.1 += successful;
        entry.2 += response_time;
    }
    drop(statement);
    tx.execute(
        "DELETE FROM endpoint_uptimes WHERE endpoint_id = ?1 AND hour_unix_timestamp < ?2",
        params![endpoint_id, min_threshold.timestamp()],
    )?;
    for (day_unix_timestamp, (total, successful, response_time)) in daily_entries {
        tx.execute(
            "INSERT INTO endpoint_uptimes (endpoint_id, hour_unix_timestamp, total_executions,
                                           successful_executions, total_response_time)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(endpoint_id, hour_unix_timestamp) DO UPDATE SET
                 total_executions = ?3,
                 successful_executions = ?4,
                 total_response_time = ?5",
            params![endpoint_id, day_unix_timestamp, total, successful, response_time],
        )?;
    }
    Ok(())
}

fn sum_uptime_entries(
    tx: &Transaction<'_>,
    endpoint_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(i64, i64, i64)> {
    let sums = tx.query_row(
        "SELECT SUM(total_executions), SUM(successful_executions), SUM(total_response_time)
         FROM endpoint_uptimes
         WHERE endpoint_id = ?1
           AND hour_unix_timestamp >= ?2
           AND hour_unix_timestamp <= ?3",
        params![endpoint_id, from.timestamp(), to.timestamp()],
        |row| {
            Ok((
                row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            ))
        },
    )?;
    Ok(sums)
}

/// Keys of endpoints that belong in the standalone listing: everything
/// except endpoints whose every result was produced inside a suite.
fn get_all_standalone_endpoint_keys(tx: &Transaction<'_>) -> Result<Vec<String>> {
    let mut statement = tx.prepare_cached(
        "SELECT endpoint_key FROM endpoints e
         WHERE EXISTS (
                   SELECT 1 FROM endpoint_results r
                   WHERE r.endpoint_id = e.endpoint_id AND r.suite_result_id IS NULL
               )
            OR NOT EXISTS (
                   SELECT 1 FROM endpoint_results r WHERE r.endpoint_id = e.endpoint_id
               )
         ORDER BY endpoint_key",
    )?;
    let keys = statement
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(keys)
}

fn get_endpoint_status_by_key_tx(
    tx: &Transaction<'_>,
    key: &str,
    params: &PagingParams,
) -> Result<EndpointStatus> {
    let (endpoint_id, group, name) = get_endpoint_id_group_and_name_by_key(tx, key)?;
    let mut status = EndpointStatus::new(&group, &name);
    if params.events_page_size > 0 {
        match get_endpoint_events_paged(tx, endpoint_id, params.events_page, params.events_page_size)
        {
            Ok(events) => status.events = events,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to retrieve events"),
        }
    }
    if params.results_page_size > 0 {
        match get_endpoint_results_paged(
            tx,
            endpoint_id,
            params.results_page,
            params.results_page_size,
        ) {
            Ok(results) => status.results = results,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to retrieve results"),
        }
    }
    Ok(status)
}

fn get_endpoint_events_paged(
    tx: &Transaction<'_>,
    endpoint_id: i64,
    page: u32,
    page_size: u32,
) -> Result<Vec<Event>> {
    let mut statement = tx.prepare_cached(
        "SELECT event_type, event_timestamp
         FROM endpoint_events
         WHERE endpoint_id = ?1
         ORDER BY endpoint_event_id ASC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = statement.query_map(
        params![endpoint_id, page_size, page.saturating_sub(1) * page_size],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    )?;
    let mut events = Vec::new();
    for row in rows {
        let (event_type, timestamp_millis) = row?;
        events.push(Event {
            event_type: event_type.parse().unwrap_or(EventType::Start),
            timestamp: DateTime::from_timestamp_millis(timestamp_millis).unwrap_or_default(),
        });
    }
    Ok(events)
}

fn get_endpoint_results_paged(
    tx: &Transaction<'_>,
    endpoint_id: i64,
    page: u32,
    page_size: u32,
) -> Result<Vec<ProbeResult>> {
    // Sorting by id rather than timestamp matches insertion order and is
    // cheaper; the page is read newest-first then flipped.
    let mut statement = tx.prepare_cached(
        "SELECT endpoint_result_id, success, connected, status, dns_rcode, certificate_expiration,
                domain_expiration, hostname, ip, duration, timestamp
         FROM endpoint_results
         WHERE endpoint_id = ?1
         ORDER BY endpoint_result_id DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = statement.query_map(
        params![endpoint_id, page_size, page.saturating_sub(1) * page_size],
        read_result_row,
    )?;
    let mut ids = Vec::new();
    let mut results = Vec::new();
    for row in rows {
        let (id, result) = row?;
        ids.push(id);
        results.push(result);
    }
    results.reverse();
    ids.reverse();
    attach_errors_and_conditions(tx, &ids, &mut results)?;
    Ok(results)
}

type ResultRow = (i64, ProbeResult);

fn read_result_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRow> {
    let id: i64 = row.get(0)?;
    let result = ProbeResult {
        success: row.get(1)?,
        connected: row.get(2)?,
        http_status: row.get::<_, i64>(3)?.max(0) as u16,
        dns_rcode: row.get(4)?,
        certificate_expiration: Duration::from_millis(row.get::<_, i64>(5)?.max(0) as u64),
        domain_expiration: Duration::from_millis(row.get::<_, i64>(6)?.max(0) as u64),
        hostname: row.get(7)?,
        ip: row.get(8)?,
        duration: Duration::from_millis(row.get::<_, i64>(9)?.max(0) as u64),
        timestamp: DateTime::from_timestamp_millis(row.get::<_, i64>(10)?).unwrap_or_default(),
        ..ProbeResult::default()
    };
    Ok((id, result))
}

/// Loads the error and condition child rows for the given result ids and
/// attaches them to the corresponding results (parallel slices).
fn attach_errors_and_conditions(
    tx: &Transaction<'_>,
    ids: &[i64],
    results: &mut [ProbeResult],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let index_by_id: BTreeMap<i64, usize> =
        ids.iter().enumerate().map(|(index, id)| (*id, index)).collect();
    let placeholders = vec!["?"; ids.len()].join(",");
    let mut statement = tx.prepare(&format!(
        "SELECT endpoint_result_id, error FROM endpoint_result_errors
         WHERE endpoint_result_id IN ({placeholders})
         ORDER BY endpoint_result_error_id ASC"
    ))?;
    let rows = statement.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (id, error) = row?;
        if let Some(&index) = index_by_id.get(&id) {
            results[index].errors.push(error);
        }
    }
    let mut statement = tx.prepare(&format!(
        "SELECT endpoint_result_id, condition, success FROM endpoint_result_conditions
         WHERE endpoint_result_id IN ({placeholders})
         ORDER BY endpoint_result_condition_id ASC"
    ))?;
    let rows = statement.query_map(params_from_iter(ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;
    for row in rows {
        let (id, condition, success) = row?;
        if let Some(&index) = index_by_id.get(&id) {
            results[index]
                .condition_results
                .push(ConditionResult { condition, success });
        }
    }
    Ok(())
}

fn get_or_insert_suite_id(tx: &Transaction<'_>, key: &str, name: &str, group: &str) -> Result<i64> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT suite_id FROM suites WHERE suite_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => Ok(id),
        None => {
            let id = tx.query_row(
                "INSERT INTO suites (suite_key, suite_name, suite_group) VALUES (?1, ?2, ?3)
                 RETURNING suite_id",
                params![key, name, group],
                |row| row.get(0),
            )?;
            Ok(id)
        }
    }
}

fn insert_suite_result_row(tx: &Transaction<'_>, suite_id: i64, result: &SuiteResult) -> Result<i64> {
    let suite_result_id: i64 = tx.query_row(
        "INSERT INTO suite_results (suite_id, success, timestamp, duration)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING suite_result_id",
        params![
            suite_id,
            result.success,
            result.timestamp.timestamp_millis(),
            result.duration.as_millis() as i64,
        ],
        |row| row.get(0),
    )?;
    let mut statement = tx.prepare_cached(
        "INSERT INTO suite_result_errors (suite_result_id, error) VALUES (?1, ?2)",
    )?;
    for error in &result.errors {
        statement.execute(params![suite_result_id, error])?;
    }
    Ok(suite_result_id)
}

fn count_suite_results(tx: &Transaction<'_>, suite_id: i64) -> Result<i64> {
    let count = tx.query_row(
        "SELECT COUNT(1) FROM suite_results WHERE suite_id = ?1",
        params![suite_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn delete_old_suite_results(tx: &Transaction<'_>, suite_id: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM suite_results
         WHERE suite_id = ?1
           AND suite_result_id NOT IN (
               SELECT suite_result_id
               FROM suite_results
               WHERE suite_id = ?1
               ORDER BY suite_result_id DESC
               LIMIT ?2
           )",
        params![suite_id, MAXIMUM_NUMBER_OF_SUITE_RESULTS],
    )?;
    Ok(())
}

fn get_suite_status_by_key_tx(
    tx: &Transaction<'_>,
    key: &str,
    params: &PagingParams,
) -> Result<SuiteStatus> {
    let (suite_id, group, name): (i64, String, String) = tx
        .query_row(
            "SELECT suite_id, suite_group, suite_name FROM suites WHERE suite_key = ?1 LIMIT 1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound {
            entity: "suite",
            key: key.to_string(),
        })?;
    let mut status = SuiteStatus::new(&group, &name);
    if params.results_page_size == 0 {
        return Ok(status);
    }
    let mut statement = tx.prepare_cached(
        "SELECT suite_result_id, success, timestamp, duration
         FROM suite_results
         WHERE suite_id = ?1
         ORDER BY suite_result_id DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = statement.query_map(
        params![
            suite_id,
            params.results_page_size,
            params.results_page.saturating_sub(1) * params.results_page_size
        ],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    )?;
    let mut suite_results = Vec::new();
    for row in rows {
        let (suite_result_id, success, timestamp_millis, duration_millis) = row?;
        suite_results.push((
            suite_result_id,
            SuiteResult {
                name: name.clone(),
                group: group.clone(),
                success,
                timestamp: DateTime::from_timestamp_millis(timestamp_millis).unwrap_or_default(),
                duration: Duration::from_millis(duration_millis.max(0) as u64),
                endpoint_results: Vec::new(),
                context: BTreeMap::new(),
                errors: Vec::new(),
            },
        ));
    }
    suite_results.reverse();
    for (suite_result_id, suite_result) in &mut suite_results {
        let mut statement = tx.prepare_cached(
            "SELECT error FROM suite_result_errors WHERE suite_result_id = ?1
             ORDER BY suite_result_error_id ASC",
        )?;
        let errors = statement
            .query_map(params![*suite_result_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        suite_result.errors = errors;
        suite_result.endpoint_results = get_suite_linked_endpoint_results(tx, *suite_result_id)?;
    }
    status.results = suite_results.into_iter().map(|(_, result)| result).collect();
    Ok(status)
}

fn get_suite_linked_endpoint_results(
    tx: &Transaction<'_>,
    suite_result_id: i64,
) -> Result<Vec<ProbeResult>> {
    let mut statement = tx.prepare_cached(
        "SELECT r.endpoint_result_id, r.success, r.connected, r.status, r.dns_rcode,
                r.certificate_expiration, r.domain_expiration, r.hostname, r.ip, r.duration,
                r.timestamp, e.endpoint_name
         FROM endpoint_results r
         JOIN endpoints e ON e.endpoint_id = r.endpoint_id
         WHERE r.suite_result_id = ?1
         ORDER BY r.endpoint_result_id ASC",
    )?;
    let rows = statement.query_map(params![suite_result_id], |row| {
        let (id, mut result) = read_result_row(row)?;
        result.name = row.get(11)?;
        Ok((id, result))
    })?;
    let mut ids = Vec::new();
    let mut results = Vec::new();
    for row in rows {
        let (id, result) = row?;
        ids.push(id);
        results.push(result);
    }
    attach_errors_and_conditions(tx, &ids, &mut results)?;
    Ok(results)
}
