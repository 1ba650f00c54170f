//! Memory -> slave schema replication.

use crate::client::TsdbClient;
use crate::model::SchemaDb;
use tracing::{error, info};

/// Create every database in `schema` on `slave`, with its default retention
/// policy, then create the remaining retention policies. Per-database and
/// per-RP failures are logged and do not abort the batch; the
/// underlying client's create operations are required to be idempotent so
/// this may be run repeatedly with no effect beyond the first successful run.
pub async fn replicate_schema(slave: &dyn TsdbClient, slave_name: &str, schema: &[SchemaDb]) {
    for db in schema {
        let Some(default_rp) = db.default_rp() else {
            // Invariant violation: get_schema should never emit a db without a
            // default RP, but guard defensively rather than panic.
            error!(database = %db.name, "schema entry has no default retention policy, skipping");
            continue;
        };

        if let Err(e) = slave.create_database(&db.name, default_rp).await {
            error!(database = %db.name, node = %slave_name, error = %e, "failed to create database on slave");
            continue;
        }

        for rp in db.non_default_rps() {
            info!(database = %db.name, retention_policy = %rp.name, "creating retention policy on slave");
            if let Err(e) = slave.create_retention_policy(&db.name, rp).await {
                error!(database = %db.name, retention_policy = %rp.name, node = %slave_name, error = %e, "failed to create retention policy on slave");
                continue;
            }
        }

        info!(database = %db.name, "schema replication complete");
    }
}
