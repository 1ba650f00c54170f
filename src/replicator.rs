//! Chunked range replicator: copies points for one `(db, rp)` over
//! a time range from master to slave, walking the range forward in
//! `chunk_duration`-sized half-open windows so query results and retry scope
//! stay bounded.

use crate::client::{ClientError, TsdbClient};
use crate::model::{row_to_point, RetentionPolicy, SchemaDb};
use crate::retry::{with_retry, RetryConfig};
use crate::shutdown::ShutdownSignal;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info, warn};

/// Clamp `[start, end]` so it respects `max_retention_interval` and the
/// retention policy's own expiry.
pub fn clamp_window(
    mut start: DateTime<Utc>,
    end: DateTime<Utc>,
    rp: &RetentionPolicy,
    max_retention_interval: ChronoDuration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if end - start > max_retention_interval {
        start = end - max_retention_interval;
    }
    if let Some(duration) = rp.finite_duration() {
        let floor = now - duration;
        if start < floor {
            start = floor;
        }
    }
    start
}

/// Split `[start, end]` into half-open `chunk_duration` windows, with the
/// final window closed at `end`.
pub fn chunk_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_duration: ChronoDuration,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if start >= end || chunk_duration <= ChronoDuration::zero() {
        return Vec::new();
    }
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = std::cmp::min(cursor + chunk_duration, end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

/// Replicate all points under `(db_name, rp)` from `master` to `slave` within
/// `[start, end]`, after clamping. Errors within one chunk are logged and the
/// next chunk is attempted; the function itself never returns an error.
#[allow(clippy::too_many_arguments)]
pub async fn replicate_range(
    master: &dyn TsdbClient,
    slave: &dyn TsdbClient,
    db_name: &str,
    rp: &RetentionPolicy,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    schema_db: &SchemaDb,
    chunk_duration: ChronoDuration,
    max_retention_interval: ChronoDuration,
    shutdown: &ShutdownSignal,
) {
    let now = Utc::now();
    let clamped_start = clamp_window(start, end, rp, max_retention_interval, now);
    if clamped_start != start {
        warn!(
            database = %db_name,
            retention_policy = %rp.name,
            original_start = %start,
            clamped_start = %clamped_start,
            "replay window start clamped"
        );
    }

    let windows = chunk_windows(clamped_start, end, chunk_duration);
    info!(
        database = %db_name,
        retention_policy = %rp.name,
        chunk_count = windows.len(),
        start = %clamped_start,
        end = %end,
        "replicating data range"
    );

    let retry_config = RetryConfig::default();

    for (chunk_start, chunk_end) in windows {
        if shutdown.is_requested() {
            info!(database = %db_name, retention_policy = %rp.name, "replay cancelled at chunk boundary");
            return;
        }
        for (measurement, field_types) in &schema_db.field_types {
            let rows = with_retry(&retry_config, || {
                master.query_range(db_name, &rp.name, measurement, chunk_start, chunk_end)
            })
            .await;

            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    error!(
                        database = %db_name,
                        retention_policy = %rp.name,
                        measurement = %measurement,
                        chunk_start = %chunk_start,
                        chunk_end = %chunk_end,
                        error = %e,
                        "query failed for chunk, skipping"
                    );
                    continue;
                }
            };

            if rows.is_empty() {
                continue;
            }

            let points: Vec<_> = rows.iter().map(|row| row_to_point(measurement, row, field_types)).collect();

            let write_result: Result<(), ClientError> =
                with_retry(&retry_config, || slave.write_points(db_name, &rp.name, &points)).await;

            if let Err(e) = write_result {
                error!(
                    database = %db_name,
                    retention_policy = %rp.name,
                    measurement = %measurement,
                    chunk_start = %chunk_start,
                    chunk_end = %chunk_end,
                    point_count = points.len(),
                    error = %e,
                    "write failed for chunk, skipping"
                );
            }
        }
    }
}

/// Replicate every `(db, rp)` pair in `schema` over `[start, end]`.
/// Per-database/per-rp failures never abort the batch.
pub async fn replicate_data(
    master: &dyn TsdbClient,
    slave: &dyn TsdbClient,
    schema: &[SchemaDb],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_duration: ChronoDuration,
    max_retention_interval: ChronoDuration,
    shutdown: &ShutdownSignal,
) {
    for db in schema {
        if shutdown.is_requested() {
            return;
        }
        for rp in &db.rps {
            info!(database = %db.name, retention_policy = %rp.name, "replicating data");
            replicate_range(master, slave, &db.name, rp, start, end, db, chunk_duration, max_retention_interval, shutdown).await;
        }
    }
}

/// Full-database resync: computes the replay window from each retention
/// policy's own span rather than a tracked outage window, for manual
/// disaster recovery.
pub async fn replicate_data_full(
    master: &dyn TsdbClient,
    slave: &dyn TsdbClient,
    schema: &[SchemaDb],
    chunk_duration: ChronoDuration,
    max_retention_interval: ChronoDuration,
    shutdown: &ShutdownSignal,
) {
    let now = Utc::now();
    for db in schema {
        if shutdown.is_requested() {
            return;
        }
        for rp in &db.rps {
            let (start, end) = rp.first_last_time(now, max_retention_interval);
            info!(database = %db.name, retention_policy = %rp.name, start = %start, end = %end, "full replication of data");
            replicate_range(master, slave, &db.name, rp, start, end, db, chunk_duration, max_retention_interval, shutdown).await;
        }
    }
}
