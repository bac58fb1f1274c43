//! Driver - owner of the worker pool and the shared job queue
//!
//! `submit` is fire-and-forget: it validates the payload, wraps it in a Job and
//! pushes it. The job's outcome is only observable through the callback itself
//! and the event sink.

use crate::application::job_queue::{JobQueue, QueueStats};
use crate::application::request::RequestProtocol;
use crate::application::worker::constants::{SHUTDOWN_POLL_INTERVAL, WORKER_THREAD_PREFIX};
use crate::application::worker::{
    shutdown_channel, ShutdownSender, Worker, WorkerContext, WorkerSnapshot, WorkerStats,
};
use crate::config::DriverConfig;
use crate::domain::{Job, JobId, Payload, Query, WorkerId};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{
    Connector, ConnectionError, DispatchEvent, EventSink, IdProvider, JobCallback, TimeProvider,
    TracingEventSink,
};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Count of jobs submitted but not yet finished (or abandoned)
#[derive(Default)]
pub(crate) struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) {
        *self.lock() += 1;
    }

    pub fn finish(&self, n: usize) {
        let mut count = self.lock();
        *count = count.saturating_sub(n);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub fn get(&self) -> usize {
        *self.lock()
    }

    /// Block until no job is outstanding; false on timeout
    pub fn wait_zero(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .idle
            .wait_timeout_while(guard, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == 0
    }
}

/// Pool-wide statistics
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub workers: Vec<WorkerSnapshot>,
    pub queue: QueueStats,
    pub outstanding: usize,
}

/// What happened during shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Worker threads that exited in time
    pub joined: usize,
    /// Worker threads still running (e.g. blocked in a read) when the timeout hit
    pub detached: usize,
    /// Pending jobs dropped without being claimed
    pub abandoned_jobs: usize,
}

/// Driver owns the fixed pool and the single job queue
pub struct Driver {
    config: DriverConfig,
    queue: Arc<JobQueue>,
    shutdown: ShutdownSender,
    outstanding: Arc<Outstanding>,
    slots: Vec<(WorkerId, Arc<WorkerStats>)>,
    handles: Vec<JoinHandle<()>>,
    failed_slots: usize,
    request: Arc<dyn JobCallback>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    events: Arc<dyn EventSink>,
}

impl Driver {
    /// Start the pool: connect every slot, then spawn one thread per connected worker.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool size, endpoint, queue order
    /// * `connector` - Opens each worker's connection
    /// * `time_provider` - Clock for submission/claim timestamps (injected for determinism)
    /// * `id_provider` - Job id generator (injected for determinism)
    /// * `events` - Receives every dispatch event
    ///
    /// # Errors
    /// - AppError::Config if the configuration is invalid
    /// - AppError::Connection if not a single slot could connect
    pub fn new(
        config: DriverConfig,
        connector: Arc<dyn Connector>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(JobQueue::new(config.queue_order));
        let (shutdown, token) = shutdown_channel(Arc::clone(&queue));
        let outstanding = Arc::new(Outstanding::default());
        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            shutdown: token,
            outstanding: Arc::clone(&outstanding),
            connector: Arc::clone(&connector),
            events: Arc::clone(&events),
            time_provider: Arc::clone(&time_provider),
        });

        info!(
            workers = config.workers,
            endpoint = %connector.endpoint(),
            order = %config.queue_order,
            "Starting worker pool"
        );

        let mut slots = Vec::with_capacity(config.workers);
        let mut handles = Vec::with_capacity(config.workers);
        let mut failed_slots = 0;
        for n in 0..config.workers {
            let id = WorkerId(n);
            let stats = Arc::new(WorkerStats::new());
            slots.push((id, Arc::clone(&stats)));

            let worker = match Worker::connect(id, Arc::clone(&ctx), stats) {
                Ok(worker) => worker,
                Err(_) => {
                    failed_slots += 1;
                    continue;
                }
            };
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", WORKER_THREAD_PREFIX, worker.id().0))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = %id, error = %e, "Could not spawn worker thread");
                    failed_slots += 1;
                }
            }
        }

        if handles.is_empty() {
            shutdown.shutdown();
            return Err(ConnectionError::Connect {
                endpoint: connector.endpoint(),
                reason: format!("none of {} worker slots could connect", config.workers),
            }
            .into());
        }
        if failed_slots > 0 {
            warn!(
                live = handles.len(),
                failed = failed_slots,
                "Worker pool running below configured size"
            );
        }

        Ok(Self {
            request: Arc::new(RequestProtocol::new(config.response_buffer_bytes)),
            config,
            queue,
            shutdown,
            outstanding,
            slots,
            handles,
            failed_slots,
            id_provider,
            time_provider,
            events,
        })
    }

    /// Start with system clock, UUID job ids and tracing events
    pub fn with_defaults(config: DriverConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::new(
            config,
            connector,
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
            Arc::new(TracingEventSink),
        )
    }

    /// Enqueue `payload` for `callback`.
    ///
    /// # Errors
    /// - AppError::Domain if the payload exceeds the 255-byte bound (never truncated)
    /// - AppError::InvalidState if the driver is shutting down
    pub fn submit(&self, callback: Arc<dyn JobCallback>, payload: &[u8]) -> Result<JobId> {
        if self.shutdown.is_shutdown() {
            return Err(AppError::InvalidState("driver is shutting down".to_string()));
        }
        let payload = Payload::new(payload)?;
        let len = payload.len();
        let query = Query::new(payload, self.time_provider.now_millis());
        let job_id = self.id_provider.next_job_id();

        self.outstanding.begin();
        self.queue.push(Job::new(job_id.clone(), query, callback));
        self.events.emit(&DispatchEvent::JobSubmitted {
            job_id: job_id.clone(),
            len,
        });
        Ok(job_id)
    }

    /// Enqueue `payload` for the send-then-read request protocol
    pub fn submit_request(&self, payload: &[u8]) -> Result<JobId> {
        self.submit(Arc::clone(&self.request), payload)
    }

    /// Handle for an external control surface (e.g. a signal handler)
    pub fn stop_handle(&self) -> ShutdownSender {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_shutdown()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    /// Worker threads spawned (including any that retired since)
    pub fn live_workers(&self) -> usize {
        self.handles.len()
    }

    pub fn failed_slots(&self) -> usize {
        self.failed_slots
    }

    /// Block until every submitted job has finished; false on timeout
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.outstanding.wait_zero(timeout)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self
                .slots
                .iter()
                .map(|(id, stats)| stats.snapshot(*id))
                .collect(),
            queue: self.queue.stats(),
            outstanding: self.outstanding.get(),
        }
    }

    /// Stop the pool.
    ///
    /// Clears the run flag, wakes every parked worker, waits up to the configured
    /// timeout for threads to exit, then drops undelivered jobs.
    pub fn shutdown(mut self) -> ShutdownReport {
        info!("Shutting down worker pool");
        self.shutdown.shutdown();

        let deadline = Instant::now() + self.config.shutdown_timeout();
        let mut report = ShutdownReport::default();
        let mut pending: Vec<JoinHandle<()>> = std::mem::take(&mut self.handles);
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|h| h.is_finished());
            for handle in finished {
                if handle.join().is_err() {
                    error!("Worker thread panicked");
                }
                report.joined += 1;
            }
            pending = running;
            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }
        report.detached = pending.len();
        if report.detached > 0 {
            warn!(
                detached = report.detached,
                "Worker threads did not exit in time (likely blocked on a read)"
            );
        }

        let abandoned = self.queue.drain();
        report.abandoned_jobs = abandoned.len();
        if report.abandoned_jobs > 0 {
            self.outstanding.finish(report.abandoned_jobs);
            self.events.emit(&DispatchEvent::JobsAbandoned {
                count: report.abandoned_jobs,
            });
        }

        info!(
            joined = report.joined,
            detached = report.detached,
            abandoned = report.abandoned_jobs,
            "Shutdown complete"
        );
        report
    }
}

impl Drop for Driver {
    // Without an explicit shutdown, at least release the parked workers.
    fn drop(&mut self) {
        if !self.shutdown.is_shutdown() {
            self.shutdown.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueueOrder, SessionId, WorkerState};
    use crate::port::connection::mocks::{MockBehavior, MockConnector};
    use crate::port::event_sink::mocks::RecordingEventSink;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_callback::mocks::{GateCallback, RecordingCallback};
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use std::collections::HashSet;

    const WAIT: Duration = Duration::from_secs(5);

    fn driver(workers: usize, connector: Arc<MockConnector>) -> (Driver, Arc<RecordingEventSink>) {
        let events = Arc::new(RecordingEventSink::new());
        let driver = Driver::new(
            DriverConfig::default().with_workers(workers),
            connector,
            Arc::new(ManualTimeProvider::new(10)),
            Arc::new(SequentialIdProvider::default()),
            events.clone(),
        )
        .unwrap();
        (driver, events)
    }

    #[test]
    fn test_every_submission_is_served_exactly_once() {
        const N: usize = 100;
        let (driver, _events) = driver(4, Arc::new(MockConnector::new_echo()));
        let (callback, rx) = RecordingCallback::new();
        let callback: Arc<dyn JobCallback> = Arc::new(callback);

        for i in 0..N {
            driver
                .submit(Arc::clone(&callback), format!("title-{}", i).as_bytes())
                .unwrap();
        }
        assert!(driver.wait_idle(WAIT));

        let mut payloads: Vec<String> = rx
            .try_iter()
            .map(|inv| String::from_utf8(inv.payload).unwrap())
            .collect();
        payloads.sort();
        let mut expected: Vec<String> = (0..N).map(|i| format!("title-{}", i)).collect();
        expected.sort();
        assert_eq!(payloads, expected);

        let report = driver.shutdown();
        assert_eq!(report.joined, 4);
        assert_eq!(report.abandoned_jobs, 0);
    }

    #[test]
    fn test_single_busy_worker_claims_lifo() {
        let (driver, _events) = driver(1, Arc::new(MockConnector::new_echo()));
        let (gate, started, release) = GateCallback::new();
        driver.submit(Arc::new(gate), b"blocker").unwrap();
        started.recv_timeout(WAIT).unwrap();

        let (callback, rx) = RecordingCallback::new();
        let callback: Arc<dyn JobCallback> = Arc::new(callback);
        for name in ["A", "B", "C"] {
            driver.submit(Arc::clone(&callback), name.as_bytes()).unwrap();
        }
        release.send(()).unwrap();
        assert!(driver.wait_idle(WAIT));

        let order: Vec<Vec<u8>> = rx.try_iter().map(|inv| inv.payload).collect();
        assert_eq!(order, vec![b"C".to_vec(), b"B".to_vec(), b"A".to_vec()]);
        driver.shutdown();
    }

    #[test]
    fn test_fifo_option_claims_in_submission_order() {
        let events = Arc::new(RecordingEventSink::new());
        let driver = Driver::new(
            DriverConfig::default()
                .with_workers(1)
                .with_queue_order(QueueOrder::Fifo),
            Arc::new(MockConnector::new_echo()),
            Arc::new(SystemTimeProvider),
            Arc::new(SequentialIdProvider::default()),
            events,
        )
        .unwrap();
        let (gate, started, release) = GateCallback::new();
        driver.submit(Arc::new(gate), b"blocker").unwrap();
        started.recv_timeout(WAIT).unwrap();

        let (callback, rx) = RecordingCallback::new();
        let callback: Arc<dyn JobCallback> = Arc::new(callback);
        for name in ["A", "B", "C"] {
            driver.submit(Arc::clone(&callback), name.as_bytes()).unwrap();
        }
        release.send(()).unwrap();
        assert!(driver.wait_idle(WAIT));

        let order: Vec<Vec<u8>> = rx.try_iter().map(|inv| inv.payload).collect();
        assert_eq!(order, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
        driver.shutdown();
    }

    #[test]
    fn test_claim_reports_time_spent_queued() {
        let events = Arc::new(RecordingEventSink::new());
        let driver = Driver::new(
            DriverConfig::default().with_workers(1),
            Arc::new(MockConnector::new_echo()),
            Arc::new(ManualTimeProvider::ticking(5_000, 40)),
            Arc::new(SequentialIdProvider::default()),
            events.clone(),
        )
        .unwrap();

        let job_id = driver.submit_request(b"dune").unwrap();
        assert!(driver.wait_idle(WAIT));

        assert_eq!(job_id, "job-1");
        let queued: Vec<i64> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DispatchEvent::JobClaimed { queued_ms, .. } => Some(queued_ms),
                _ => None,
            })
            .collect();
        assert_eq!(queued, vec![40]);
        driver.shutdown();
    }

    #[test]
    fn test_binding_matches_claiming_worker_under_concurrency() {
        let (driver, _events) = driver(8, Arc::new(MockConnector::new_echo()));
        let (callback, rx) = RecordingCallback::new();
        let callback: Arc<dyn JobCallback> = Arc::new(callback);
        for i in 0..400 {
            driver
                .submit(Arc::clone(&callback), format!("q{}", i).as_bytes())
                .unwrap();
        }
        assert!(driver.wait_idle(WAIT));

        // Slot n connected n-th, so it holds session n + 1.
        let invocations: Vec<_> = rx.try_iter().collect();
        assert_eq!(invocations.len(), 400);
        for inv in &invocations {
            let worker = inv.logical_id.unwrap();
            assert_eq!(inv.session_id, Some(inv.connection_session));
            assert_eq!(inv.connection_session, SessionId(worker.0 as u64 + 1));
        }
        driver.shutdown();
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let (driver, _events) = driver(1, Arc::new(MockConnector::new_echo()));

        let result = driver.submit_request(&[b'x'; 256]);

        assert!(matches!(result, Err(AppError::Domain(_))));
        assert_eq!(driver.pending_jobs(), 0);
        assert_eq!(driver.outstanding(), 0);
        assert!(driver.submit_request(&[b'x'; 255]).is_ok());
        driver.shutdown();
    }

    #[test]
    fn test_failed_slots_shrink_the_pool() {
        let connector = Arc::new(MockConnector::new_echo());
        connector.refuse_next(2);
        let (driver, events) = driver(3, connector);

        assert_eq!(driver.live_workers(), 1);
        assert_eq!(driver.failed_slots(), 2);
        let states: Vec<WorkerState> = driver.stats().workers.iter().map(|w| w.state).collect();
        assert_eq!(states[0], WorkerState::Stopped);
        assert_eq!(states[1], WorkerState::Stopped);
        assert_eq!(
            events
                .events()
                .iter()
                .filter(|e| matches!(e, DispatchEvent::ConnectFailed { .. }))
                .count(),
            2
        );
        driver.shutdown();
    }

    #[test]
    fn test_no_connectable_slot_is_an_error() {
        let result = Driver::new(
            DriverConfig::default().with_workers(2),
            Arc::new(MockConnector::new_refusing()),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
            Arc::new(RecordingEventSink::new()),
        );
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    #[test]
    fn test_submit_after_stop_is_refused() {
        let (driver, _events) = driver(1, Arc::new(MockConnector::new_echo()));
        driver.stop_handle().shutdown();

        assert!(!driver.is_running());
        assert!(matches!(
            driver.submit_request(b"late"),
            Err(AppError::InvalidState(_))
        ));
        let report = driver.shutdown();
        assert_eq!(report.joined, 1);
    }

    #[test]
    fn test_shutdown_reports_abandoned_jobs() {
        let (driver, events) = driver(1, Arc::new(MockConnector::new_echo()));
        let (gate, started, release) = GateCallback::new();
        driver.submit(Arc::new(gate), b"blocker").unwrap();
        started.recv_timeout(WAIT).unwrap();
        driver.submit_request(b"never-served").unwrap();

        let stop = driver.stop_handle();
        stop.shutdown();
        release.send(()).unwrap();
        let report = driver.shutdown();

        assert_eq!(report.joined, 1);
        assert_eq!(report.abandoned_jobs, 1);
        assert!(events
            .events()
            .contains(&DispatchEvent::JobsAbandoned { count: 1 }));
    }

    #[test]
    fn test_request_protocol_failures_surface_as_events() {
        let connector = Arc::new(MockConnector::new(MockBehavior::FailSend(
            "reset".to_string(),
        )));
        let (driver, events) = driver(1, connector);

        let job_id = driver.submit_request(b"dune").unwrap();
        assert!(driver.wait_idle(WAIT));

        assert!(events.wait_until(WAIT, |evs| evs.iter().any(
            |e| matches!(e, DispatchEvent::JobFailed { job_id: id, .. } if *id == job_id)
        )));
        assert_eq!(driver.stats().workers[0].failed, 1);
        driver.shutdown();
    }

    #[test]
    fn test_job_ids_are_distinct() {
        let (driver, _events) = driver(2, Arc::new(MockConnector::new_echo()));
        let ids: HashSet<JobId> = (0..20)
            .map(|_| driver.submit_request(b"same").unwrap())
            .collect();
        assert_eq!(ids.len(), 20);
        assert!(driver.wait_idle(WAIT));
        driver.shutdown();
    }
}
