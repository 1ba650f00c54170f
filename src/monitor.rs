//! Node Monitor: wraps one database endpoint, probes it on its own
//! cadence, and publishes the last-known reachability state under its own lock.

use crate::client::TsdbClient;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeState {
    pub reachable: bool,
    pub last_ok: DateTime<Utc>,
    pub last_check_duration: ChronoDuration,
}

struct Inner {
    name: String,
    client: Arc<dyn TsdbClient>,
    state: RwLock<NodeState>,
}

/// Probes one endpoint at `probe_interval` and exposes the latest reading via
/// `state()`. The probe loop itself is started by `spawn` and runs for the
/// lifetime of the process.
pub struct NodeMonitor {
    inner: Arc<Inner>,
}

impl NodeMonitor {
    pub fn new(name: impl Into<String>, client: Arc<dyn TsdbClient>, now: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                client,
                state: RwLock::new(NodeState {
                    reachable: false,
                    last_ok: now,
                    last_check_duration: ChronoDuration::zero(),
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Spawn the background probe loop. Returns a handle the caller may abort
    /// on shutdown; dropping it does not stop the loop, since the probe task
    /// owns its own clone of the shared state.
    pub fn spawn(&self, probe_interval: Duration) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                probe_once(&inner).await;
            }
        })
    }

    /// Run one probe immediately, independent of the background loop's cadence.
    /// Used at supervisor startup so the first tick has fresh state.
    pub async fn probe_now(&self) {
        probe_once(&self.inner).await;
    }

    pub async fn state(&self) -> NodeState {
        *self.inner.state.read().await
    }

    pub async fn refresh_client(&self) -> Result<(), crate::client::ClientError> {
        self.inner.client.refresh_client().await
    }
}

async fn probe_once(inner: &Inner) {
    let started = std::time::Instant::now();
    let result = inner.client.ping().await;
    let elapsed = ChronoDuration::from_std(started.elapsed()).unwrap_or(ChronoDuration::zero());

    let mut state = inner.state.write().await;
    state.last_check_duration = elapsed;
    match result {
        Ok(()) => {
            state.reachable = true;
            state.last_ok = Utc::now();
            debug!(node = %inner.name, "probe ok");
        }
        Err(e) => {
            state.reachable = false;
            warn!(node = %inner.name, error = %e, "probe failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;

    #[tokio::test]
    async fn probe_now_sets_reachable_on_success() {
        let client = Arc::new(FakeClient::new());
        let monitor = NodeMonitor::new("master", client, Utc::now());
        monitor.probe_now().await;
        let state = monitor.state().await;
        assert!(state.reachable);
    }

    #[tokio::test]
    async fn probe_now_does_not_advance_last_ok_on_failure() {
        let client = Arc::new(FakeClient::new());
        client.set_reachable(false);
        let before = Utc::now() - ChronoDuration::hours(1);
        let monitor = NodeMonitor::new("slave", client, before);
        monitor.probe_now().await;
        let state = monitor.state().await;
        assert!(!state.reachable);
        assert_eq!(state.last_ok, before);
    }

    #[tokio::test]
    async fn last_ok_advances_only_on_success() {
        let client = Arc::new(FakeClient::new());
        let monitor = NodeMonitor::new("slave", client.clone(), Utc::now() - ChronoDuration::hours(1));
        monitor.probe_now().await;
        let ok_time = monitor.state().await.last_ok;

        client.set_reachable(false);
        monitor.probe_now().await;
        let state = monitor.state().await;
        assert!(!state.reachable);
        assert_eq!(state.last_ok, ok_time);
    }
}
