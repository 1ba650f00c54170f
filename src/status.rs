//! Status snapshot: an immutable, torn-read-free view of
//! supervisor state for external observers (e.g. the status HTTP surface).

use chrono::{DateTime, Duration as ChronoDuration, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Ok,
    CheckSlaveDown,
    Recovering,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ClusterStatus {
    pub cluster_state: ClusterState,
    pub num_recovers: u64,
    #[serde(with = "duration_ms")]
    pub last_recover_duration: ChronoDuration,
    pub master_id: String,
    pub slave_id: String,
    pub master_reachable: bool,
    pub master_last_ok: DateTime<Utc>,
    pub slave_reachable: bool,
    pub slave_last_ok: DateTime<Utc>,
}

mod duration_ms {
    use chrono::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }
}
