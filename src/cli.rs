//! Command-line surface: a long-running `run` daemon plus one-shot
//! `schema` and `replay` operator commands.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ha-replicator")]
#[command(about = "Active/passive HA supervisor for a time-series database cluster")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = crate::config::CONFIG_FILENAME, global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the supervisor daemon: health checks, automatic recovery, status HTTP server.
    Run(RunArgs),
    /// Schema operations against the configured master/slave pair.
    Schema(SchemaArgs),
    /// Manually replay a time range or a whole database from master to slave.
    Replay(ReplayArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Override the status HTTP listen address from the config file.
    #[arg(long, env = "HA_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Override the master node address from the config file.
    #[arg(long, env = "HA_MASTER_URL")]
    pub master_url: Option<String>,

    /// Override the slave node address from the config file.
    #[arg(long, env = "HA_SLAVE_URL")]
    pub slave_url: Option<String>,

    /// Override the health-check interval, in seconds.
    #[arg(long, env = "HA_CHECK_INTERVAL")]
    pub check_interval: Option<u64>,

    /// Override the replay chunk size, in minutes.
    #[arg(long, env = "HA_CHUNK_DURATION")]
    pub chunk_duration: Option<i64>,

    /// Override the maximum single-replay window, in hours.
    #[arg(long, env = "HA_MAX_RETENTION_INTERVAL")]
    pub max_retention_interval: Option<i64>,

    /// Override the database-name filter regex from the config file.
    #[arg(long, env = "HA_DB_FILTER")]
    pub db_filter: Option<String>,
}

#[derive(clap::Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommands,
}

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Discover schema on the master and print it as JSON.
    Discover,
    /// Discover schema on the master and replicate it to the slave.
    Replicate,
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Restrict to one database (default: every database in schema).
    #[arg(long)]
    pub db: Option<String>,

    /// Restrict to one retention policy (requires --db).
    #[arg(long)]
    pub rp: Option<String>,

    /// Range start: RFC3339 timestamp or relative duration like -1h.
    #[arg(long)]
    pub start: Option<String>,

    /// Range end: RFC3339 timestamp or relative duration like -1h. Defaults to now.
    #[arg(long)]
    pub end: Option<String>,

    /// Replay each retention policy's full span instead of an explicit range.
    #[arg(long)]
    pub full: bool,
}
