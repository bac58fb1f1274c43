// `fanout run`: start the pool, submit the workload, wait, shut down

use crate::output;
use crate::settings::{expand_path, Settings};
use crate::workload::read_workload;
use anyhow::{Context, Result};
use fanout_core::domain::WorkerState;
use fanout_core::Driver;
use fanout_infra_net::TcpConnector;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatsFormat {
    Table,
    Json,
}

pub struct RunArgs {
    pub exit_when_idle: bool,
    pub stats: Option<StatsFormat>,
}

pub async fn execute(settings: Settings, args: RunArgs) -> Result<()> {
    let workload_path = expand_path(&settings.workload.path);
    let workload = read_workload(&workload_path, settings.workload.max_queries)?;
    info!(
        path = %workload_path.display(),
        queries = workload.queries.len(),
        skipped = workload.skipped,
        "Workload loaded"
    );

    let connector = Arc::new(
        TcpConnector::new(&settings.driver.endpoint).context("Invalid endpoint")?,
    );
    let config = settings.driver.clone();
    // Connecting the slots is blocking I/O.
    let driver = tokio::task::spawn_blocking(move || Driver::with_defaults(config, connector))
        .await?
        .context("Failed to start worker pool")?;

    for payload in &workload.queries {
        if let Err(e) = driver.submit_request(payload.as_bytes()) {
            warn!(error = %e, payload = %payload.to_string_lossy(), "Submit failed");
        }
    }

    info!("Press Ctrl+C to shutdown");
    wait_for_exit(&driver, args.exit_when_idle).await?;

    let (stats, report) = tokio::task::spawn_blocking(move || {
        let stats = driver.stats();
        let report = driver.shutdown();
        (stats, report)
    })
    .await?;

    match args.stats {
        Some(StatsFormat::Table) => println!("{}", output::render_table(&stats, &report)),
        Some(StatsFormat::Json) => println!("{}", output::render_json(&stats, &report)?),
        None => {}
    }
    Ok(())
}

/// Ctrl-C, or (with `exit_when_idle`) no outstanding jobs, whichever comes first
async fn wait_for_exit(driver: &Driver, exit_when_idle: bool) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if !exit_when_idle {
        ctrl_c.await?;
        info!("Shutdown signal received");
        return Ok(());
    }

    let mut tick = tokio::time::interval(IDLE_POLL_INTERVAL);
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                info!("Shutdown signal received");
                return Ok(());
            }
            _ = tick.tick() => {
                if driver.outstanding() == 0 {
                    info!("All submitted jobs finished");
                    return Ok(());
                }
                if all_stopped(driver) {
                    warn!(outstanding = driver.outstanding(), "No worker left to serve the queue");
                    return Ok(());
                }
            }
        }
    }
}

// Every worker retired: nothing will ever drain the queue.
fn all_stopped(driver: &Driver) -> bool {
    driver
        .stats()
        .workers
        .iter()
        .all(|w| w.state == WorkerState::Stopped)
}
