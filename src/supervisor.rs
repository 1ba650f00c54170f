//! HA supervisor state machine: a single long-lived task that
//! ticks on `check_interval`, consumes monitor readings for master and slave,
//! and drives `ClusterState` transitions. On the slave's "detected UP" edge it
//! triggers schema refresh and ranged data replication over the outage
//! window, then publishes the result via `status()`.

use crate::client::TsdbClient;
use crate::model::SchemaDb;
use crate::monitor::NodeMonitor;
use crate::replicator::replicate_data;
use crate::schema::{get_schema, replicate_schema};
use crate::shutdown::ShutdownSignal;
use crate::status::{ClusterState, ClusterStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub struct SupervisorConfig {
    pub check_interval: StdDuration,
    pub chunk_duration: ChronoDuration,
    pub max_retention_interval: ChronoDuration,
    pub db_filter: Option<String>,
}

struct Fields {
    cluster_state: ClusterState,
    prev_slave_ok: bool,
    slave_last_ok: DateTime<Utc>,
    slave_check_duration: ChronoDuration,
    master_reachable: bool,
    master_last_ok: DateTime<Utc>,
    master_check_duration: ChronoDuration,
    num_recovers: u64,
    last_recover_duration: ChronoDuration,
}

pub struct Supervisor {
    master_name: String,
    slave_name: String,
    master_client: Arc<dyn TsdbClient>,
    slave_client: Arc<dyn TsdbClient>,
    master_monitor: NodeMonitor,
    slave_monitor: NodeMonitor,
    config: SupervisorConfig,
    fields: RwLock<Fields>,
    schema: RwLock<Vec<SchemaDb>>,
}

impl Supervisor {
    pub fn new(
        master_name: impl Into<String>,
        slave_name: impl Into<String>,
        master_client: Arc<dyn TsdbClient>,
        slave_client: Arc<dyn TsdbClient>,
        config: SupervisorConfig,
    ) -> Self {
        let master_name = master_name.into();
        let slave_name = slave_name.into();
        let now = Utc::now();
        let master_monitor = NodeMonitor::new(master_name.clone(), master_client.clone(), now);
        let slave_monitor = NodeMonitor::new(slave_name.clone(), slave_client.clone(), now);
        Self {
            master_name,
            slave_name,
            master_client,
            slave_client,
            master_monitor,
            slave_monitor,
            config,
            fields: RwLock::new(Fields {
                cluster_state: ClusterState::Ok,
                prev_slave_ok: false,
                slave_last_ok: now,
                slave_check_duration: ChronoDuration::zero(),
                master_reachable: false,
                master_last_ok: now,
                master_check_duration: ChronoDuration::zero(),
                num_recovers: 0,
                last_recover_duration: ChronoDuration::zero(),
            }),
            schema: RwLock::new(Vec::new()),
        }
    }

    pub async fn status(&self) -> ClusterStatus {
        let fields = self.fields.read().await;
        ClusterStatus {
            cluster_state: fields.cluster_state,
            num_recovers: fields.num_recovers,
            last_recover_duration: fields.last_recover_duration,
            master_id: self.master_name.clone(),
            slave_id: self.slave_name.clone(),
            master_reachable: fields.master_reachable,
            master_last_ok: fields.master_last_ok,
            slave_reachable: fields.prev_slave_ok,
            slave_last_ok: fields.slave_last_ok,
        }
    }

    pub async fn schema(&self) -> Vec<SchemaDb> {
        self.schema.read().await.clone()
    }

    /// Probe both nodes immediately, outside their background cadence.
    /// Exposed for operators driving the state machine one tick at a time
    /// (tests, the `replay` CLI path).
    pub async fn probe_now(&self) {
        self.master_monitor.probe_now().await;
        self.slave_monitor.probe_now().await;
    }

    /// Run exactly one supervisor iteration. Exposed alongside `probe_now`
    /// for callers that want tick-by-tick control instead of `run`'s loop.
    pub async fn tick(&self, shutdown: &ShutdownSignal) {
        self.check_cluster(shutdown).await;
    }

    /// Populate the schema cache from the master. Called eagerly at startup
    /// and again at the leading edge of every recovery, so a schema change
    /// made while the slave was down is picked up before replay runs.
    async fn refresh_schema(&self) {
        match get_schema(self.master_client.as_ref(), &self.master_name, self.config.db_filter.as_deref()).await {
            Ok(schema) => {
                info!(database_count = schema.len(), "schema discovery complete");
                *self.schema.write().await = schema;
            }
            Err(e) => {
                error!(error = %e, "schema discovery failed, keeping previously cached schema");
            }
        }
    }

    /// Run the supervisor loop until `shutdown` fires. Exactly one iteration
    /// runs per tick boundary; a slow iteration (e.g. one that triggers a
    /// multi-minute recovery) simply consumes the next tick when it returns,
    /// which is the intended back-pressure.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        self.probe_now().await;
        self.refresh_schema().await;

        let _master_probe = self.master_monitor.spawn(self.config.check_interval);
        let _slave_probe = self.slave_monitor.spawn(self.config.check_interval);

        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(check_interval_secs = self.config.check_interval.as_secs(), "supervisor starting");

        loop {
            ticker.tick().await;
            if shutdown.is_requested() {
                info!("shutdown requested, exiting supervisor loop");
                return;
            }
            self.check_cluster(&shutdown).await;
        }
    }

    /// One supervisor iteration: consult both node monitors and drive the
    /// cluster state transition table.
    async fn check_cluster(&self, shutdown: &ShutdownSignal) {
        debug!("HACluster check....");

        let master_state = self.master_monitor.state().await;
        let slave_state = self.slave_monitor.state().await;

        let (current_state, prev_slave_ok) = {
            let fields = self.fields.read().await;
            (fields.cluster_state, fields.prev_slave_ok)
        };

        // Detected DOWN: from any state, the moment a previously-OK slave goes unreachable.
        if prev_slave_ok && !slave_state.reachable {
            info!(
                slave_last_ok = %slave_state.last_ok,
                check_duration_ms = slave_state.last_check_duration.num_milliseconds(),
                "detected slave DOWN"
            );
            let mut fields = self.fields.write().await;
            fields.cluster_state = ClusterState::CheckSlaveDown;
            fields.master_reachable = master_state.reachable;
            fields.master_last_ok = master_state.last_ok;
            fields.master_check_duration = master_state.last_check_duration;
            fields.slave_last_ok = slave_state.last_ok;
            fields.prev_slave_ok = slave_state.reachable;
            fields.slave_check_duration = slave_state.last_check_duration;
            return;
        }

        match current_state {
            ClusterState::CheckSlaveDown if !slave_state.reachable => {
                // Still down: refresh master fields only.
                let mut fields = self.fields.write().await;
                fields.master_reachable = master_state.reachable;
                fields.master_last_ok = master_state.last_ok;
                fields.master_check_duration = master_state.last_check_duration;
            }
            ClusterState::CheckSlaveDown if slave_state.reachable => {
                self.recover(master_state, slave_state, shutdown).await;
            }
            ClusterState::Recovering => {
                // A previous tick's recovery is still running concurrently is
                // not possible (recovery runs inline within one iteration),
                // but guard re-entry defensively and just refresh fields.
                let mut fields = self.fields.write().await;
                fields.master_reachable = master_state.reachable;
                fields.master_last_ok = master_state.last_ok;
                fields.master_check_duration = master_state.last_check_duration;
                fields.slave_last_ok = slave_state.last_ok;
                fields.prev_slave_ok = slave_state.reachable;
                fields.slave_check_duration = slave_state.last_check_duration;
            }
            ClusterState::Ok if slave_state.reachable => {
                let mut fields = self.fields.write().await;
                fields.master_reachable = master_state.reachable;
                fields.master_last_ok = master_state.last_ok;
                fields.master_check_duration = master_state.last_check_duration;
                fields.slave_last_ok = slave_state.last_ok;
                fields.prev_slave_ok = slave_state.reachable;
                fields.slave_check_duration = slave_state.last_check_duration;
            }
            other => {
                // Unreachable given the transitions handled above, but kept as
                // a defensive fallback rather than a panic.
                tracing::warn!(
                    state = ?other,
                    master_reachable = master_state.reachable,
                    slave_reachable = slave_state.reachable,
                    "unhandled supervisor state combination"
                );
            }
        }
    }

    /// Detected-UP transition: OK -> CHECK_SLAVE_DOWN -> RECOVERING -> OK.
    async fn recover(&self, master_state: crate::monitor::NodeState, slave_state: crate::monitor::NodeState, shutdown: &ShutdownSignal) {
        let retained_slave_last_ok = self.fields.read().await.slave_last_ok;
        let start_time = retained_slave_last_ok - ChronoDuration::from_std(self.config.check_interval).unwrap_or(ChronoDuration::zero());
        let end_time = slave_state.last_ok;

        info!(start = %start_time, end = %end_time, "detected slave UP, entering recovery");

        {
            let mut fields = self.fields.write().await;
            fields.cluster_state = ClusterState::Recovering;
            fields.master_reachable = master_state.reachable;
            fields.master_last_ok = master_state.last_ok;
            fields.master_check_duration = master_state.last_check_duration;
            fields.slave_last_ok = slave_state.last_ok;
            fields.prev_slave_ok = slave_state.reachable;
            fields.slave_check_duration = slave_state.last_check_duration;
        }

        if let Err(e) = self.slave_monitor.refresh_client().await {
            error!(error = %e, "failed to refresh slave client before recovery, continuing anyway");
        }

        self.refresh_schema().await;
        let schema = self.schema().await;

        let started = std::time::Instant::now();
        replicate_data(
            self.master_client.as_ref(),
            self.slave_client.as_ref(),
            &schema,
            start_time,
            end_time,
            self.config.chunk_duration,
            self.config.max_retention_interval,
            shutdown,
        )
        .await;
        let elapsed = ChronoDuration::from_std(started.elapsed()).unwrap_or(ChronoDuration::zero());

        info!(elapsed_ms = elapsed.num_milliseconds(), "recovery replay complete");

        let mut fields = self.fields.write().await;
        fields.cluster_state = ClusterState::Ok;
        fields.num_recovers += 1;
        fields.last_recover_duration = elapsed;
    }

    /// One-shot schema replication, used by the `schema replicate` CLI
    /// subcommand as well as internally after discovery completes.
    pub async fn replicate_schema_now(&self) {
        let schema = self.schema().await;
        replicate_schema(self.slave_client.as_ref(), &self.slave_name, &schema).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::model::RetentionPolicy;
    use std::time::Duration as StdDuration;

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            check_interval: StdDuration::from_millis(10),
            chunk_duration: ChronoDuration::minutes(1),
            max_retention_interval: ChronoDuration::hours(24),
            db_filter: None,
        }
    }

    fn default_rp() -> RetentionPolicy {
        RetentionPolicy {
            name: "autogen".to_string(),
            duration: None,
            shard_group_duration: ChronoDuration::hours(1),
            replication: 1,
            is_default: true,
        }
    }

    fn make_supervisor() -> (Supervisor, Arc<FakeClient>, Arc<FakeClient>) {
        let master = Arc::new(FakeClient::new());
        let slave = Arc::new(FakeClient::new());
        master.seed_database("telegraf", vec![default_rp()]);
        slave.seed_database("telegraf", vec![default_rp()]);
        let supervisor = Supervisor::new("master", "slave", master.clone(), slave.clone(), config());
        (supervisor, master, slave)
    }

    #[tokio::test]
    async fn starts_in_ok_state_when_both_reachable() {
        let (supervisor, _master, _slave) = make_supervisor();
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;

        let status = supervisor.status().await;
        assert_eq!(status.cluster_state, ClusterState::Ok);
        assert_eq!(status.num_recovers, 0);
    }

    #[tokio::test]
    async fn transitions_to_check_slave_down_then_recovers() {
        let (supervisor, _master, slave) = make_supervisor();

        // Establish OK baseline.
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;
        assert_eq!(supervisor.status().await.cluster_state, ClusterState::Ok);

        // Slave goes down.
        slave.set_reachable(false);
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;
        assert_eq!(supervisor.status().await.cluster_state, ClusterState::CheckSlaveDown);

        // Still down: state unchanged.
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;
        assert_eq!(supervisor.status().await.cluster_state, ClusterState::CheckSlaveDown);

        // Slave returns: recovery runs inline and settles back to OK.
        slave.set_reachable(true);
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;

        let status = supervisor.status().await;
        assert_eq!(status.cluster_state, ClusterState::Ok);
        assert_eq!(status.num_recovers, 1);
        assert_eq!(slave.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn recovery_completes_and_sets_ok_even_if_master_unreachable() {
        let (supervisor, master, slave) = make_supervisor();

        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;

        slave.set_reachable(false);
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;

        master.set_reachable(false);
        slave.set_reachable(true);
        supervisor.probe_now().await;
        supervisor.check_cluster(&ShutdownSignal::never()).await;

        let status = supervisor.status().await;
        assert_eq!(status.cluster_state, ClusterState::Ok);
        assert_eq!(status.num_recovers, 1);
    }
}
