//! Master -> memory schema discovery.

use crate::client::TsdbClient;
use crate::model::{FieldTypes, SchemaDb};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, error};

#[derive(Debug)]
pub enum DiscoveryError {
    InvalidFilter(regex::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidFilter(e) => write!(f, "invalid database filter regex: {}", e),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// List databases on `master`, retain those matching `db_filter` (if any),
/// and read back each retained database's retention policies, measurements
/// and field types. A database with a transient query failure, or with no
/// default retention policy, is logged and skipped rather than failing the
/// whole call.
pub async fn get_schema(
    master: &dyn TsdbClient,
    master_name: &str,
    db_filter: Option<&str>,
) -> Result<Vec<SchemaDb>, DiscoveryError> {
    let filter = db_filter
        .map(Regex::new)
        .transpose()
        .map_err(DiscoveryError::InvalidFilter)?;

    let all_dbs = match master.list_databases().await {
        Ok(dbs) => dbs,
        Err(e) => {
            error!(node = %master_name, error = %e, "failed to list databases during discovery");
            Vec::new()
        }
    };

    let mut schema = Vec::new();
    for db in all_dbs {
        if let Some(re) = &filter {
            if !re.is_match(&db) {
                debug!(database = %db, filter = %re.as_str(), "database does not match filter, skipping");
                continue;
            }
        }

        let rps = match master.list_retention_policies(&db).await {
            Ok(rps) => rps,
            Err(e) => {
                error!(database = %db, node = %master_name, error = %e, "failed to list retention policies, skipping database");
                continue;
            }
        };

        let default_rp = match rps.iter().find(|rp| rp.is_default) {
            Some(rp) => rp,
            None => {
                error!(database = %db, node = %master_name, "database has no default retention policy, skipping");
                continue;
            }
        };
        let default_rp_name = default_rp.name.clone();

        let measurements = match master.list_measurements(&db).await {
            Ok(m) => m,
            Err(e) => {
                error!(database = %db, node = %master_name, error = %e, "failed to list measurements, skipping database");
                continue;
            }
        };

        let mut field_types: FieldTypes = BTreeMap::new();
        for measurement in measurements {
            match master.list_fields(&db, &measurement).await {
                Ok(fields) => {
                    debug!(database = %db, measurement = %measurement, "discovered measurement");
                    field_types.insert(measurement, fields);
                }
                Err(e) => {
                    error!(database = %db, measurement = %measurement, error = %e, "failed to list fields, skipping measurement");
                }
            }
        }

        schema.push(SchemaDb {
            name: db,
            default_rp_name,
            rps,
            field_types,
        });
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::model::{FieldType, RetentionPolicy};
    use chrono::Duration;

    fn rp(name: &str, is_default: bool) -> RetentionPolicy {
        RetentionPolicy {
            name: name.to_string(),
            duration: None,
            shard_group_duration: Duration::hours(1),
            replication: 1,
            is_default,
        }
    }

    #[tokio::test]
    async fn discovers_databases_and_measurements() {
        let client = FakeClient::new();
        client.seed_database("telegraf", vec![rp("autogen", true)]);
        client.seed_measurement(
            "telegraf",
            "cpu",
            BTreeMap::from([("usage".to_string(), FieldType::Float)]),
        );

        let schema = get_schema(&client, "master", None).await.unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].name, "telegraf");
        assert_eq!(schema[0].default_rp_name, "autogen");
        assert!(schema[0].field_types.contains_key("cpu"));
    }

    #[tokio::test]
    async fn filter_regex_restricts_databases() {
        let client = FakeClient::new();
        client.seed_database("telegraf", vec![rp("autogen", true)]);
        client.seed_database("apps", vec![rp("one_week", true)]);

        let schema = get_schema(&client, "master", Some("^tele")).await.unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].name, "telegraf");
    }

    #[tokio::test]
    async fn invalid_filter_is_fatal() {
        let client = FakeClient::new();
        let result = get_schema(&client, "master", Some("(unclosed")).await;
        assert!(matches!(result, Err(DiscoveryError::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn database_without_default_rp_is_skipped() {
        let client = FakeClient::new();
        client.seed_database("legacy", vec![rp("only_rp", false)]);
        client.seed_database("telegraf", vec![rp("autogen", true)]);

        let schema = get_schema(&client, "master", None).await.unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].name, "telegraf");
    }
}
