//! Fanout CLI - fixed worker pool dispatching queries over persistent connections

mod commands;
mod logging;
mod output;
mod settings;
mod workload;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::run::{RunArgs, StatsFormat};
use fanout_core::domain::QueueOrder;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Dispatch queries to a remote service over a fixed pool of connections", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML); defaults to the platform config dir
    #[arg(long, global = true, env = "FANOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Number of worker slots
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Remote host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Remote port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Claim order for pending jobs
    #[arg(long, global = true, value_enum)]
    order: Option<OrderArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Lifo,
    Fifo,
}

impl From<OrderArg> for QueueOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Lifo => QueueOrder::Lifo,
            OrderArg::Fifo => QueueOrder::Fifo,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the pool and submit the workload file
    Run {
        /// Workload file (whitespace-separated queries)
        #[arg(long)]
        workload: Option<String>,

        /// Submit at most this many queries
        #[arg(long)]
        max_queries: Option<usize>,

        /// Exit once every submitted query has been served
        #[arg(long)]
        exit_when_idle: bool,

        /// Print pool statistics after shutdown
        #[arg(long, value_enum)]
        stats: Option<StatsFormat>,
    },

    /// Serve the lookup stub on the configured endpoint
    ServeStub {
        /// Catalog file: "<token> <content...>" per line
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = settings::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        settings.driver.workers = workers;
    }
    if let Some(host) = cli.host {
        settings.driver.endpoint.host = host;
    }
    if let Some(port) = cli.port {
        settings.driver.endpoint.port = port;
    }
    if let Some(order) = cli.order {
        settings.driver.queue_order = order.into();
    }
    settings.driver.validate()?;

    let _log_guard = logging::init_logging(&settings.log)?;
    info!("Fanout v{} starting...", fanout_core::VERSION);

    match cli.command {
        Commands::Run {
            workload,
            max_queries,
            exit_when_idle,
            stats,
        } => {
            if let Some(path) = workload {
                settings.workload.path = path;
            }
            if let Some(max) = max_queries {
                settings.workload.max_queries = max;
            }
            commands::run::execute(
                settings,
                RunArgs {
                    exit_when_idle,
                    stats,
                },
            )
            .await?;
        }
        Commands::ServeStub { catalog } => {
            commands::serve_stub::execute(&settings, catalog.as_deref()).await?;
        }
    }

    info!("Shutdown complete.");
    Ok(())
}
