//! Job Scheduling
//!
//! Runs jobs with bounded concurrency and collects results in completion order.
//!
//! ## Data Flow
//!
//! ```text
//!   Vec<TestJob>
//!        │  producer (caller thread)
//!        ▼
//! ┌──────────────────┐
//! │ bounded queue(K) │  job indexes
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   K workers      │  rayon pool, one JobExecutor call at a time each
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ result channel   │  Started / Finished messages
//! └────────┬─────────┘
//!          ▼
//!   collector (caller thread) → ScheduleOutcome
//! ```
//!
//! Every submitted job produces exactly one result. A panic inside a job
//! becomes an ERROR result at the worker; a job whose result never arrives
//! becomes an ERROR result at the collector.

use crate::supervisor::{ProcessRunner, write_error_log};
use crossbeam::channel::{self, Receiver, Sender};
use optmatrix_core::{TestJob, TestResult};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Runs a single job. Implementations must not fail: every outcome is a result.
pub trait JobExecutor: Send + Sync + 'static {
    /// Execute `job` and classify its outcome
    fn execute(&self, job: &TestJob) -> TestResult;
}

impl JobExecutor for ProcessRunner {
    fn execute(&self, job: &TestJob) -> TestResult {
        self.run(job)
    }
}

/// Progress notification delivered on the caller's thread
#[derive(Debug, Clone, Copy)]
pub enum SchedulerEvent<'a> {
    /// A worker picked up the job
    Started(&'a TestJob),
    /// The job's result was collected
    Finished(&'a TestResult),
}

/// Everything a scheduling run produced
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    /// One result per submitted job, in completion order
    pub results: Vec<TestResult>,
    /// Highest number of jobs observed running at once
    pub peak_active: usize,
}

/// Bounded-concurrency job scheduler
pub struct Scheduler<E> {
    executor: Arc<E>,
    max_parallel: usize,
}

enum WorkerMessage {
    Started { index: usize },
    Finished { index: usize, result: TestResult },
}

impl<E: JobExecutor> Scheduler<E> {
    /// Create a scheduler running at most `max_parallel` jobs at once (minimum 1)
    pub fn new(executor: E, max_parallel: usize) -> Self {
        Self {
            executor: Arc::new(executor),
            max_parallel: max_parallel.max(1),
        }
    }

    /// The concurrency bound
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run every job, calling `on_event` as jobs start and finish.
    pub fn run<F>(&self, jobs: Vec<TestJob>, mut on_event: F) -> ScheduleOutcome
    where
        F: FnMut(SchedulerEvent<'_>),
    {
        let total = jobs.len();
        if total == 0 {
            return ScheduleOutcome::default();
        }

        let worker_count = self.max_parallel.min(total);
        let pool = match ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("optmatrix-worker-{i}"))
            .panic_handler(|_| tracing::error!("worker thread panicked outside a job"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                let message = format!("failed to build worker pool: {e}");
                tracing::warn!(error = %e, "failed to build worker pool");
                let results = jobs
                    .iter()
                    .map(|job| {
                        write_error_log(job, &message);
                        let result = TestResult::error(job, message.clone(), Duration::ZERO);
                        on_event(SchedulerEvent::Finished(&result));
                        result
                    })
                    .collect();
                return ScheduleOutcome {
                    results,
                    peak_active: 0,
                };
            }
        };

        let jobs = Arc::new(jobs);
        let gauge = Arc::new(ActiveGauge::default());
        let (queue_tx, queue_rx) = channel::bounded::<usize>(worker_count);
        let (message_tx, message_rx) = channel::unbounded::<WorkerMessage>();

        for _ in 0..worker_count {
            let executor = Arc::clone(&self.executor);
            let jobs = Arc::clone(&jobs);
            let gauge = Arc::clone(&gauge);
            let queue = queue_rx.clone();
            let messages = message_tx.clone();
            pool.spawn(move || worker_loop(&*executor, &jobs, &gauge, queue, messages));
        }
        // Only workers hold these now, so disconnection means every worker is gone.
        drop(queue_rx);
        drop(message_tx);

        let mut collector = Collector::new(total);
        let mut queue = Some(queue_tx);
        let mut next = 0;

        while collector.remaining > 0 {
            let message = match queue.take() {
                Some(tx) => {
                    let mut keep_open = true;
                    let mut received = None;
                    channel::select! {
                        send(tx, next) -> sent => match sent {
                            Ok(()) => {
                                next += 1;
                                keep_open = next < total;
                            }
                            Err(_) => keep_open = false,
                        },
                        recv(message_rx) -> msg => received = Some(msg),
                    }
                    // Dropping the sender tells idle workers to exit.
                    if keep_open {
                        queue = Some(tx);
                    }
                    match received {
                        Some(msg) => msg,
                        None => continue,
                    }
                }
                None => message_rx.recv(),
            };

            match message {
                Ok(WorkerMessage::Started { index }) => {
                    on_event(SchedulerEvent::Started(&jobs[index]));
                }
                Ok(WorkerMessage::Finished { index, result }) => {
                    if let Some(result) = collector.accept(index, result) {
                        on_event(SchedulerEvent::Finished(result));
                    }
                }
                Err(_) => break,
            }
        }

        for index in collector.unaccounted() {
            let job = &jobs[index];
            let message = "result lost before collection";
            tracing::warn!(job = %job.label(), "{message}");
            write_error_log(job, message);
            let result = TestResult::error(job, message, Duration::ZERO);
            if let Some(result) = collector.accept(index, result) {
                on_event(SchedulerEvent::Finished(result));
            }
        }

        ScheduleOutcome {
            results: collector.results,
            peak_active: gauge.peak(),
        }
    }
}

fn worker_loop<E: JobExecutor>(
    executor: &E,
    jobs: &[TestJob],
    gauge: &ActiveGauge,
    queue: Receiver<usize>,
    messages: Sender<WorkerMessage>,
) {
    for index in queue.iter() {
        let job = &jobs[index];
        if messages.send(WorkerMessage::Started { index }).is_err() {
            break;
        }

        let start = Instant::now();
        let outcome = {
            let _active = gauge.enter();
            panic::catch_unwind(AssertUnwindSafe(|| executor.execute(job)))
        };
        let result = outcome.unwrap_or_else(|payload| {
            let message = format!("job panicked: {}", panic_message(payload.as_ref()));
            tracing::warn!(job = %job.label(), "{message}");
            write_error_log(job, &message);
            TestResult::error(job, message, start.elapsed())
        });

        if messages.send(WorkerMessage::Finished { index, result }).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Accounts for each job index exactly once
struct Collector {
    seen: Vec<bool>,
    remaining: usize,
    results: Vec<TestResult>,
}

impl Collector {
    fn new(total: usize) -> Self {
        Self {
            seen: vec![false; total],
            remaining: total,
            results: Vec::with_capacity(total),
        }
    }

    fn accept(&mut self, index: usize, result: TestResult) -> Option<&TestResult> {
        if std::mem::replace(&mut self.seen[index], true) {
            tracing::warn!(job = %result.label(), "duplicate result ignored");
            return None;
        }
        self.remaining -= 1;
        self.results.push(result);
        self.results.last()
    }

    fn unaccounted(&self) -> Vec<usize> {
        self.seen
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Counts running jobs and remembers the maximum
#[derive(Default)]
struct ActiveGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveGauge {
    fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a ActiveGauge);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}
