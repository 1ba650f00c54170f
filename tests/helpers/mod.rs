use chrono::Duration as ChronoDuration;
use ha_replicator::client::fake::FakeClient;
use ha_replicator::model::RetentionPolicy;
use ha_replicator::supervisor::{Supervisor, SupervisorConfig};
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub fn rp(name: &str, duration_hours: Option<i64>) -> RetentionPolicy {
    RetentionPolicy {
        name: name.to_string(),
        duration: duration_hours.map(ChronoDuration::hours),
        shard_group_duration: ChronoDuration::hours(1),
        replication: 1,
        is_default: true,
    }
}

pub fn make_supervisor(master: Arc<FakeClient>, slave: Arc<FakeClient>) -> Supervisor {
    Supervisor::new(
        "master",
        "slave",
        master,
        slave,
        SupervisorConfig {
            check_interval: StdDuration::from_millis(10),
            chunk_duration: ChronoDuration::minutes(5),
            max_retention_interval: ChronoDuration::hours(24),
            db_filter: None,
        },
    )
}
