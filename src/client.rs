//! The time-series database client contract.
//!
//! This is an external collaborator: connect/query/write semantics for the
//! concrete store are left to an implementation supplied by the integrator.
//! The core depends only on this trait, the same way a sender-based pipeline
//! depends on an abstract sender rather than a concrete HTTP client.

use crate::model::{Point, RetentionPolicy, Row};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug)]
pub enum ClientError {
    Unreachable(String),
    Query(String),
    Write(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Unreachable(msg) => write!(f, "node unreachable: {}", msg),
            ClientError::Query(msg) => write!(f, "query error: {}", msg),
            ClientError::Write(msg) => write!(f, "write error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl crate::retry::IsRetryable for ClientError {
    fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Unreachable(_) | ClientError::Query(_) | ClientError::Write(_))
    }
}

/// Either a concrete instant or "the store holds no points for this series".
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundTime {
    At(DateTime<Utc>),
    Empty,
}

/// Operations the HA core requires from a time-series database endpoint.
///
/// Implementations must treat `create_database`/`create_retention_policy` as
/// idempotent: calling them against an already-existing object is success, not
/// an error.
#[async_trait]
pub trait TsdbClient: Send + Sync {
    /// Cheap reachability probe used by the node monitor.
    async fn ping(&self) -> Result<(), ClientError>;

    async fn list_databases(&self) -> Result<Vec<String>, ClientError>;
    async fn list_retention_policies(&self, db: &str) -> Result<Vec<RetentionPolicy>, ClientError>;
    async fn list_measurements(&self, db: &str) -> Result<Vec<String>, ClientError>;
    async fn list_fields(&self, db: &str, measurement: &str) -> Result<BTreeMap<String, crate::model::FieldType>, ClientError>;

    async fn create_database(&self, db: &str, default_rp: &RetentionPolicy) -> Result<(), ClientError>;
    async fn create_retention_policy(&self, db: &str, rp: &RetentionPolicy) -> Result<(), ClientError>;

    async fn query_range(
        &self,
        db: &str,
        rp: &str,
        measurement: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Row>, ClientError>;

    async fn write_points(&self, db: &str, rp: &str, points: &[Point]) -> Result<(), ClientError>;

    #[allow(dead_code)]
    async fn earliest_time(&self, db: &str, rp: &str) -> Result<BoundTime, ClientError>;
    #[allow(dead_code)]
    async fn latest_time(&self, db: &str, rp: &str) -> Result<BoundTime, ClientError>;

    /// Re-establish the underlying connection. Called by the supervisor right
    /// after a detected recovery, before replay begins.
    async fn refresh_client(&self) -> Result<(), ClientError>;
}

/// An in-memory `TsdbClient` used by unit and integration tests in place of a
/// real database connection.
pub mod fake {
    use super::*;
    use crate::model::{FieldType, Point};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        reachable: bool,
        databases: BTreeMap<String, DbState>,
        refresh_calls: u32,
    }

    struct DbState {
        rps: Vec<RetentionPolicy>,
        measurements: BTreeMap<String, BTreeMap<String, FieldType>>,
        points: Vec<(String, String, Point)>, // (rp, measurement, point)
    }

    /// A fake TSDB endpoint, configurable for deterministic tests: databases,
    /// retention policies, measurements, field types and stored rows can all
    /// be seeded, and reachability can be flipped to simulate outages.
    pub struct FakeClient {
        state: Mutex<State>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(State {
                    reachable: true,
                    ..Default::default()
                }),
            }
        }

        pub fn set_reachable(&self, reachable: bool) {
            self.state.lock().unwrap().reachable = reachable;
        }

        pub fn refresh_calls(&self) -> u32 {
            self.state.lock().unwrap().refresh_calls
        }

        pub fn seed_database(&self, name: &str, rps: Vec<RetentionPolicy>) {
            self.state.lock().unwrap().databases.insert(
                name.to_string(),
                DbState {
                    rps,
                    measurements: BTreeMap::new(),
                    points: Vec::new(),
                },
            );
        }

        pub fn seed_measurement(&self, db: &str, measurement: &str, fields: BTreeMap<String, FieldType>) {
            let mut state = self.state.lock().unwrap();
            let db = state.databases.get_mut(db).expect("seed_database first");
            db.measurements.insert(measurement.to_string(), fields);
        }

        /// Insert a source-side row directly, as if previously written. Used by
        /// master fixtures so `query_range` has something to return.
        pub fn seed_row(&self, db: &str, rp: &str, measurement: &str, point: Point) {
            let mut state = self.state.lock().unwrap();
            let db = state.databases.get_mut(db).expect("seed_database first");
            db.points.push((rp.to_string(), measurement.to_string(), point));
        }

        pub fn databases_on_slave(&self) -> Vec<String> {
            self.state.lock().unwrap().databases.keys().cloned().collect()
        }

        pub fn rps_on(&self, db: &str) -> Vec<RetentionPolicy> {
            self.state
                .lock()
                .unwrap()
                .databases
                .get(db)
                .map(|d| d.rps.clone())
                .unwrap_or_default()
        }

        pub fn points_written(&self, db: &str, rp: &str, measurement: &str) -> Vec<Point> {
            self.state
                .lock()
                .unwrap()
                .databases
                .get(db)
                .map(|d| {
                    d.points
                        .iter()
                        .filter(|(r, m, _)| r == rp && m == measurement)
                        .map(|(_, _, p)| p.clone())
                        .collect()
                })
                .unwrap_or_default()
        }
    }

    impl Default for FakeClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TsdbClient for FakeClient {
        async fn ping(&self) -> Result<(), ClientError> {
            if self.state.lock().unwrap().reachable {
                Ok(())
            } else {
                Err(ClientError::Unreachable("fake node down".to_string()))
            }
        }

        async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
            Ok(self.state.lock().unwrap().databases.keys().cloned().collect())
        }

        async fn list_retention_policies(&self, db: &str) -> Result<Vec<RetentionPolicy>, ClientError> {
            self.state
                .lock()
                .unwrap()
                .databases
                .get(db)
                .map(|d| d.rps.clone())
                .ok_or_else(|| ClientError::Query(format!("unknown database {}", db)))
        }

        async fn list_measurements(&self, db: &str) -> Result<Vec<String>, ClientError> {
            self.state
                .lock()
                .unwrap()
                .databases
                .get(db)
                .map(|d| d.measurements.keys().cloned().collect())
                .ok_or_else(|| ClientError::Query(format!("unknown database {}", db)))
        }

        async fn list_fields(&self, db: &str, measurement: &str) -> Result<BTreeMap<String, FieldType>, ClientError> {
            self.state
                .lock()
                .unwrap()
                .databases
                .get(db)
                .and_then(|d| d.measurements.get(measurement))
                .cloned()
                .ok_or_else(|| ClientError::Query(format!("unknown measurement {}.{}", db, measurement)))
        }

        async fn create_database(&self, db: &str, default_rp: &RetentionPolicy) -> Result<(), ClientError> {
            let mut state = self.state.lock().unwrap();
            state
                .databases
                .entry(db.to_string())
                .or_insert_with(|| DbState {
                    rps: vec![default_rp.clone()],
                    measurements: BTreeMap::new(),
                    points: Vec::new(),
                });
            Ok(())
        }

        async fn create_retention_policy(&self, db: &str, rp: &RetentionPolicy) -> Result<(), ClientError> {
            let mut state = self.state.lock().unwrap();
            let entry = state
                .databases
                .get_mut(db)
                .ok_or_else(|| ClientError::Write(format!("unknown database {}", db)))?;
            if !entry.rps.iter().any(|existing| existing.name == rp.name) {
                entry.rps.push(rp.clone());
            }
            Ok(())
        }

        async fn query_range(
            &self,
            db: &str,
            rp: &str,
            measurement: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Row>, ClientError> {
            if !self.state.lock().unwrap().reachable {
                return Err(ClientError::Unreachable("fake node down".to_string()));
            }
            let state = self.state.lock().unwrap();
            let db = state
                .databases
                .get(db)
                .ok_or_else(|| ClientError::Query(format!("unknown database {}", db)))?;
            let start_ns = start.timestamp_nanos_opt().unwrap_or(i64::MIN);
            let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX);
            let rows = db
                .points
                .iter()
                .filter(|(r, m, p)| r == rp && m == measurement && p.timestamp_ns >= start_ns && p.timestamp_ns < end_ns)
                .map(|(_, _, p)| Row {
                    tags: p.tags.clone(),
                    fields: p
                        .fields
                        .iter()
                        .map(|(k, v)| (k.clone(), field_value_to_json(v)))
                        .collect(),
                    timestamp_ns: p.timestamp_ns,
                })
                .collect();
            Ok(rows)
        }

        async fn write_points(&self, db: &str, rp: &str, points: &[Point]) -> Result<(), ClientError> {
            if !self.state.lock().unwrap().reachable {
                return Err(ClientError::Write("fake node down".to_string()));
            }
            let mut state = self.state.lock().unwrap();
            let entry = state
                .databases
                .get_mut(db)
                .ok_or_else(|| ClientError::Write(format!("unknown database {}", db)))?;
            for point in points {
                // idempotent overwrite: same (measurement, tags, timestamp) replaces in place
                if let Some(existing) = entry.points.iter_mut().find(|(r, m, p)| {
                    r == rp && m == &point.measurement && p.tags == point.tags && p.timestamp_ns == point.timestamp_ns
                }) {
                    existing.2 = point.clone();
                } else {
                    entry.points.push((rp.to_string(), point.measurement.clone(), point.clone()));
                }
            }
            Ok(())
        }

        async fn earliest_time(&self, _db: &str, _rp: &str) -> Result<BoundTime, ClientError> {
            Ok(BoundTime::Empty)
        }

        async fn latest_time(&self, _db: &str, _rp: &str) -> Result<BoundTime, ClientError> {
            Ok(BoundTime::Empty)
        }

        async fn refresh_client(&self) -> Result<(), ClientError> {
            self.state.lock().unwrap().refresh_calls += 1;
            Ok(())
        }
    }

    fn field_value_to_json(v: &crate::model::FieldValue) -> serde_json::Value {
        match v {
            crate::model::FieldValue::Float(f) => serde_json::json!(f),
            crate::model::FieldValue::Integer(i) => serde_json::json!(i),
            crate::model::FieldValue::String(s) => serde_json::json!(s),
            crate::model::FieldValue::Boolean(b) => serde_json::json!(b),
        }
    }
}
