mod helpers;

use ha_replicator::client::fake::FakeClient;
use ha_replicator::shutdown::ShutdownSignal;
use ha_replicator::ClusterState;
use std::sync::Arc;

#[tokio::test]
async fn clean_start_both_up_stays_ok_with_no_recoveries() {
    let master = Arc::new(FakeClient::new());
    let slave = Arc::new(FakeClient::new());
    master.seed_database("telegraf", vec![helpers::rp("autogen", None)]);
    master.seed_database("apps", vec![helpers::rp("one_week", Some(168))]);
    slave.seed_database("telegraf", vec![helpers::rp("autogen", None)]);
    slave.seed_database("apps", vec![helpers::rp("one_week", Some(168))]);

    let supervisor = helpers::make_supervisor(master, slave);
    let signal = ShutdownSignal::never();

    for _ in 0..3 {
        supervisor.probe_now().await;
        supervisor.tick(&signal).await;
    }

    let status = supervisor.status().await;
    assert_eq!(status.cluster_state, ClusterState::Ok);
    assert_eq!(status.num_recovers, 0);
}

#[tokio::test]
async fn slave_blip_triggers_single_recovery() {
    let master = Arc::new(FakeClient::new());
    let slave = Arc::new(FakeClient::new());
    master.seed_database("telegraf", vec![helpers::rp("autogen", None)]);
    slave.seed_database("telegraf", vec![helpers::rp("autogen", None)]);

    let supervisor = helpers::make_supervisor(master, slave.clone());
    let signal = ShutdownSignal::never();

    // t=0: both up.
    supervisor.probe_now().await;
    supervisor.tick(&signal).await;
    assert_eq!(supervisor.status().await.cluster_state, ClusterState::Ok);

    // t=60s: slave fails.
    slave.set_reachable(false);
    supervisor.probe_now().await;
    supervisor.tick(&signal).await;
    assert_eq!(supervisor.status().await.cluster_state, ClusterState::CheckSlaveDown);

    // t=120s: slave returns. One tick drives the full CheckSlaveDown -> Recovering -> Ok transition.
    slave.set_reachable(true);
    supervisor.probe_now().await;
    supervisor.tick(&signal).await;

    let status = supervisor.status().await;
    assert_eq!(status.cluster_state, ClusterState::Ok);
    assert_eq!(status.num_recovers, 1);
}

#[tokio::test]
async fn recovery_completes_even_if_master_goes_down_mid_replay() {
    let master = Arc::new(FakeClient::new());
    let slave = Arc::new(FakeClient::new());
    master.seed_database("telegraf", vec![helpers::rp("autogen", None)]);
    slave.seed_database("telegraf", vec![helpers::rp("autogen", None)]);

    let supervisor = helpers::make_supervisor(master.clone(), slave.clone());
    let signal = ShutdownSignal::never();

    supervisor.probe_now().await;
    supervisor.tick(&signal).await;

    slave.set_reachable(false);
    supervisor.probe_now().await;
    supervisor.tick(&signal).await;

    master.set_reachable(false);
    slave.set_reachable(true);
    supervisor.probe_now().await;
    supervisor.tick(&signal).await;

    let status = supervisor.status().await;
    assert_eq!(status.cluster_state, ClusterState::Ok, "recovery must settle to Ok even when the master is unreachable during replay");
    assert_eq!(status.num_recovers, 1);
}
