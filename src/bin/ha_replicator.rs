use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ha_replicator::cli::{Cli, Commands, ReplayArgs, SchemaCommands};
use ha_replicator::client::fake::FakeClient;
use ha_replicator::config::Config;
use ha_replicator::http::{build_router, init_tracing};
use ha_replicator::model::SchemaDb;
use ha_replicator::replicator::{replicate_data, replicate_data_full};
use ha_replicator::schema::{get_schema, replicate_schema};
use ha_replicator::shutdown::{self, ShutdownSignal};
use ha_replicator::supervisor::{Supervisor, SupervisorConfig};
use ha_replicator::time::parse_input_time;
use ha_replicator::TsdbClient;
use std::sync::Arc;
use tracing::info;

/// Build the pair of database clients the supervisor drives. A concrete
/// `TsdbClient` for the real store is supplied by the integrator; this
/// binary wires the in-memory fake so `run`/`replay`/`schema` are runnable
/// end to end without a live database.
fn build_clients(_config: &Config) -> (Arc<dyn TsdbClient>, Arc<dyn TsdbClient>) {
    (Arc::new(FakeClient::new()), Arc::new(FakeClient::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load().with_context(|| format!("no {} found in the current directory", ha_replicator::config::CONFIG_FILENAME))?;
    let (master, slave) = build_clients(&config);

    match cli.command {
        Commands::Run(args) => run_daemon(config, args, master, slave).await?,
        Commands::Schema(args) => run_schema(&config, master, slave, args.command).await?,
        Commands::Replay(args) => run_replay(&config, master, slave, args).await?,
    }

    Ok(())
}

/// Apply `run`-subcommand overrides on top of the file-loaded config. CLI
/// flags (and their `env` equivalents) win when present.
fn apply_run_overrides(mut config: Config, args: &ha_replicator::cli::RunArgs) -> Config {
    if let Some(addr) = &args.master_url {
        config.master_addr = addr.clone();
    }
    if let Some(addr) = &args.slave_url {
        config.slave_addr = addr.clone();
    }
    if let Some(secs) = args.check_interval {
        config.check_interval_secs = secs;
    }
    if let Some(minutes) = args.chunk_duration {
        config.chunk_minutes = minutes;
    }
    if let Some(hours) = args.max_retention_interval {
        config.max_retention_hours = hours;
    }
    if args.db_filter.is_some() {
        config.db_filter = args.db_filter.clone();
    }
    if let Some(addr) = &args.listen_addr {
        config.listen_addr = addr.clone();
    }
    config
}

async fn run_daemon(config: Config, args: ha_replicator::cli::RunArgs, master: Arc<dyn TsdbClient>, slave: Arc<dyn TsdbClient>) -> Result<()> {
    let config = apply_run_overrides(config, &args);
    let listen_addr = config.listen_addr.clone();

    let supervisor = Arc::new(Supervisor::new(
        "master",
        "slave",
        master,
        slave,
        SupervisorConfig {
            check_interval: config.check_interval(),
            chunk_duration: config.chunk_duration(),
            max_retention_interval: config.max_retention_interval(),
            db_filter: config.db_filter.clone(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let supervisor_task = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.run(shutdown_rx).await })
    };

    let router = build_router(supervisor);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind status listener on {}", listen_addr))?;
    info!(addr = %listen_addr, "status HTTP surface listening");

    let shutdown_signal = async move {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
        info!("shutdown requested, signaling supervisor");
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).await?;

    supervisor_task.await.context("supervisor task panicked")?;
    Ok(())
}

async fn run_schema(config: &Config, master: Arc<dyn TsdbClient>, slave: Arc<dyn TsdbClient>, command: SchemaCommands) -> Result<()> {
    let schema = get_schema(master.as_ref(), "master", config.db_filter.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    match command {
        SchemaCommands::Discover => print_schema(&schema)?,
        SchemaCommands::Replicate => {
            replicate_schema(slave.as_ref(), "slave", &schema).await;
            info!(database_count = schema.len(), "schema replication complete");
        }
    }
    Ok(())
}

fn print_schema(schema: &[SchemaDb]) -> Result<()> {
    #[derive(serde::Serialize)]
    struct SchemaView<'a> {
        name: &'a str,
        default_rp: &'a str,
        retention_policies: Vec<&'a str>,
        measurements: Vec<&'a str>,
    }

    let view: Vec<SchemaView> = schema
        .iter()
        .map(|db| SchemaView {
            name: &db.name,
            default_rp: &db.default_rp_name,
            retention_policies: db.rps.iter().map(|rp| rp.name.as_str()).collect(),
            measurements: db.field_types.keys().map(|s| s.as_str()).collect(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn run_replay(config: &Config, master: Arc<dyn TsdbClient>, slave: Arc<dyn TsdbClient>, args: ReplayArgs) -> Result<()> {
    let schema = get_schema(master.as_ref(), "master", config.db_filter.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut schema: Vec<SchemaDb> = match &args.db {
        Some(name) => schema.into_iter().filter(|db| &db.name == name).collect(),
        None => schema,
    };
    if let Some(rp_name) = &args.rp {
        for db in &mut schema {
            db.rps.retain(|rp| &rp.name == rp_name);
        }
    }

    let chunk_duration = config.chunk_duration();
    let max_retention_interval = config.max_retention_interval();

    if args.full {
        replicate_data_full(master.as_ref(), slave.as_ref(), &schema, chunk_duration, max_retention_interval, &ShutdownSignal::never()).await;
        return Ok(());
    }

    let now = Utc::now();
    let start = match &args.start {
        Some(s) => parse_input_time(s, now)?,
        None => anyhow::bail!("--start is required unless --full is given"),
    };
    let end = match &args.end {
        Some(s) => parse_input_time(s, now)?,
        None => now,
    };

    replicate_data(master.as_ref(), slave.as_ref(), &schema, start, end, chunk_duration, max_retention_interval, &ShutdownSignal::never()).await;
    Ok(())
}
