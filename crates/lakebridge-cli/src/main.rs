//! lakebridge: inspect derived resource names and rehearse a full
//! connection lifecycle against the in-memory sandbox.
//!
//! # Usage
//!
//! ```text
//! lakebridge names --bucket analytics-1
//! lakebridge changelog public.events sales.orders
//! lakebridge rehearse --bucket analytics-1 --tables public.orders,public.events
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::rehearse::{FailStep, RehearseArgs};

#[derive(Parser)]
#[command(
    name = "lakebridge",
    about = "Lakebridge: analytics-bucket connection orchestrator",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every resource name derived from a bucket id
    Names {
        /// Analytics bucket id
        #[arg(short, long)]
        bucket: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the catalog table name for source tables
    Changelog {
        /// Source tables as `schema.table`
        #[arg(required = true)]
        tables: Vec<String>,
    },
    /// Connect, reconcile, toggle, and tear down a bucket in the sandbox.
    ///
    /// Every collaborator is simulated in memory; the replicator creates
    /// catalog tables after --replicator-lag catalog listings.
    Rehearse {
        /// Analytics bucket id
        #[arg(short, long)]
        bucket: String,
        /// Source tables to connect, comma-separated `schema.table`
        #[arg(short, long, value_delimiter = ',', required = true)]
        tables: Vec<String>,
        /// Path to lakebridge.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Inject a failure into one provisioning step
        #[arg(long, value_enum)]
        fail_step: Option<FailStep>,
        /// Catalog listings before the replicator creates tables
        #[arg(long, default_value = "2")]
        replicator_lag: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lakebridge=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Names { bucket, format } => commands::names::names(&bucket, &format),
        Commands::Changelog { tables } => commands::changelog::changelog(&tables),
        Commands::Rehearse {
            bucket,
            tables,
            config,
            fail_step,
            replicator_lag,
        } => {
            commands::rehearse::rehearse(RehearseArgs {
                bucket,
                tables,
                config,
                fail_step,
                replicator_lag,
            })
            .await
        }
    }
}
