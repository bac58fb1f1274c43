// Stats rendering (table or JSON)

use anyhow::Result;
use colored::Colorize;
use fanout_core::application::{PoolStats, ShutdownReport, WorkerSnapshot};
use serde_json::json;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct WorkerRow {
    worker: String,
    state: String,
    session: String,
    served: u64,
    failed: u64,
    panicked: u64,
    reconnects: u64,
}

impl From<&WorkerSnapshot> for WorkerRow {
    fn from(w: &WorkerSnapshot) -> Self {
        Self {
            worker: w.worker.to_string(),
            state: w.state.to_string(),
            session: w.session.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            served: w.served,
            failed: w.failed,
            panicked: w.panicked,
            reconnects: w.reconnects,
        }
    }
}

pub fn render_table(stats: &PoolStats, report: &ShutdownReport) -> String {
    let rows: Vec<WorkerRow> = stats.workers.iter().map(WorkerRow::from).collect();
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Worker Pool".cyan().bold()));
    out.push_str(&Table::new(rows).to_string());
    out.push('\n');
    out.push_str(&format!(
        "  {} {} pushed, {} popped, {} signal posts\n",
        "Queue:".bold(),
        stats.queue.pushes,
        stats.queue.pops,
        stats.queue.signal_posts
    ));
    let abandoned = if report.abandoned_jobs > 0 {
        report.abandoned_jobs.to_string().yellow()
    } else {
        report.abandoned_jobs.to_string().green()
    };
    let detached = if report.detached > 0 {
        report.detached.to_string().red()
    } else {
        report.detached.to_string().green()
    };
    out.push_str(&format!(
        "  {} {} joined, {} detached, {} jobs abandoned\n",
        "Shutdown:".bold(),
        report.joined,
        detached,
        abandoned
    ));
    out
}

pub fn render_json(stats: &PoolStats, report: &ShutdownReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json!({
        "pool": stats,
        "shutdown": report,
    }))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::application::QueueStats;
    use fanout_core::domain::{SessionId, WorkerId, WorkerState};

    fn sample() -> (PoolStats, ShutdownReport) {
        let stats = PoolStats {
            workers: vec![WorkerSnapshot {
                worker: WorkerId(0),
                state: WorkerState::Stopped,
                session: Some(SessionId(1)),
                served: 3,
                failed: 1,
                panicked: 0,
                reconnects: 1,
            }],
            queue: QueueStats {
                pending: 0,
                pushes: 4,
                pops: 4,
                signal_posts: 6,
            },
            outstanding: 0,
        };
        let report = ShutdownReport {
            joined: 1,
            detached: 0,
            abandoned_jobs: 0,
        };
        (stats, report)
    }

    #[test]
    fn test_table_lists_each_worker() {
        colored::control::set_override(false);
        let (stats, report) = sample();

        let table = render_table(&stats, &report);

        assert!(table.contains("worker-0"));
        assert!(table.contains("session-1"));
        assert!(table.contains("STOPPED"));
        assert!(table.contains("4 pushed"));
    }

    #[test]
    fn test_json_shape() {
        let (stats, report) = sample();

        let value: serde_json::Value =
            serde_json::from_str(&render_json(&stats, &report).unwrap()).unwrap();

        assert_eq!(value["pool"]["workers"][0]["served"], 3);
        assert_eq!(value["pool"]["queue"]["signal_posts"], 6);
        assert_eq!(value["shutdown"]["joined"], 1);
    }
}
