//! Dispatcher module
//!
//! Runs a batch of jobs on a fixed pool of workers fed from a single queue,
//! then reports CPU-vs-wall-clock efficiency.

use crate::aggregator::Aggregator;
use crate::job::Job;
use crate::render::RenderConfig;
use crate::report::RunReport;
use crate::worker::{JobError, JobOutcome, SharedQueue, Worker, WorkerEvent};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Error type for a dispatch run
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A job failed; the whole run is aborted
    #[error(transparent)]
    Job(#[from] JobError),

    /// Workers went away without reporting queue exhaustion
    #[error("{lost} of {expected} workers stopped without draining the queue")]
    WorkersLost { expected: usize, lost: usize },
}

/// Fixed-size worker pool over a pull queue
pub struct Dispatcher {
    config: Arc<RenderConfig>,
    concurrency: usize,
}

impl Dispatcher {
    /// Create a dispatcher running at most `concurrency` engines at once
    ///
    /// A zero concurrency is raised to one worker.
    pub fn new(config: RenderConfig, concurrency: usize) -> Self {
        Self {
            config: Arc::new(config),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job to completion and return the run report
    ///
    /// Jobs are queued in order, but workers may finish them in any order.
    /// Prints `Finished K of N` for each job as it completes. The run ends once
    /// every worker has signalled that the queue is exhausted.
    ///
    /// # Errors
    /// The first job failure aborts the run: remaining workers are cancelled and
    /// the error is returned. Engines already running are not killed.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<RunReport, DispatchError> {
        let started = Instant::now();
        let total = jobs.len();
        let aggregator = Aggregator::shared();

        // Capacity 1 keeps the feeder at most one job ahead of the workers.
        let (job_tx, job_rx) = mpsc::channel::<Job>(1);
        let queue: SharedQueue = Arc::new(Mutex::new(job_rx));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        info!(
            jobs = total,
            workers = self.concurrency,
            preset = self.config.quality_preset.as_str(),
            "starting dispatch"
        );

        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            let worker = Worker::new(
                id,
                self.config.clone(),
                queue.clone(),
                aggregator.clone(),
                event_tx.clone(),
            );
            workers.spawn(worker.run());
        }
        drop(event_tx);

        // Dropping the sender at the end closes the queue.
        let feeder = tokio::spawn(async move {
            for job in jobs {
                if job_tx.send(job).await.is_err() {
                    break;
                }
            }
        });

        let mut finished = 0usize;
        let mut skipped = 0usize;
        let mut exhausted = 0usize;

        while exhausted < self.concurrency {
            match event_rx.recv().await {
                Some(WorkerEvent::JobFinished {
                    worker,
                    job,
                    outcome,
                }) => {
                    finished += 1;
                    if outcome == JobOutcome::Skipped {
                        skipped += 1;
                    }
                    debug!(
                        worker,
                        job = %job.source_path().display(),
                        outcome = outcome.as_str(),
                        "job finished"
                    );
                    println!("Finished {} of {}", finished, total);
                }
                Some(WorkerEvent::WorkerExhausted { worker }) => {
                    exhausted += 1;
                    debug!(worker, exhausted, "worker done");
                }
                Some(WorkerEvent::Fatal { worker, error }) => {
                    error!(worker, "{}", error);
                    feeder.abort();
                    workers.abort_all();
                    return Err(DispatchError::Job(error));
                }
                None => {
                    feeder.abort();
                    return Err(DispatchError::WorkersLost {
                        expected: self.concurrency,
                        lost: self.concurrency - exhausted,
                    });
                }
            }
        }

        while workers.join_next().await.is_some() {}
        let _ = feeder.await;

        let totals = aggregator.snapshot().await;
        let report = RunReport {
            wall_time: started.elapsed(),
            user_time: totals.user_time,
            system_time: totals.system_time,
            jobs_total: total,
            jobs_finished: finished,
            jobs_rendered: totals.rendered_jobs,
            jobs_skipped: skipped,
            concurrency: self.concurrency,
            worker_signals: exhausted,
        };

        info!(
            rendered = report.jobs_rendered,
            skipped = report.jobs_skipped,
            parallelism = report.parallelism(),
            "dispatch complete"
        );

        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use crate::test_support::{busy_engine, mock_engine, scene};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn run_batch(jobs: usize, concurrency: usize) -> RunReport {
        let temp = TempDir::new().unwrap();
        let engine = mock_engine(temp.path(), 0.0);
        let batch: Vec<Job> = (0..jobs)
            .map(|i| scene(temp.path(), &format!("frame_{:04}", i)))
            .collect();

        let dispatcher = Dispatcher::new(engine.render_config(), concurrency);
        let report = dispatcher.run(batch).await.unwrap();
        assert_eq!(engine.invocations(), jobs);
        report
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_empty_batch_reports_zero_jobs() {
        let dispatcher = Dispatcher::new(RenderConfig::default(), 3);
        let report = dispatcher.run(Vec::new()).await.unwrap();

        assert_eq!(report.jobs_total, 0);
        assert_eq!(report.jobs_finished, 0);
        assert_eq!(report.jobs_rendered, 0);
        assert_eq!(report.worker_signals, 3);
        assert_eq!(report.user_time, Duration::ZERO);
    }

    // Completion contract: one finished signal per job, one exhaustion signal
    // per worker, whether the pool is smaller or larger than the batch.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_counts_with_fewer_workers_than_jobs() {
        let report = run_batch(7, 2).await;
        assert_eq!(report.jobs_finished, 7);
        assert_eq!(report.jobs_rendered, 7);
        assert_eq!(report.worker_signals, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_counts_with_more_workers_than_jobs() {
        let report = run_batch(3, 8).await;
        assert_eq!(report.jobs_finished, 3);
        assert_eq!(report.jobs_rendered, 3);
        assert_eq!(report.worker_signals, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_counts_with_single_worker() {
        let report = run_batch(4, 1).await;
        assert_eq!(report.jobs_finished, 4);
        assert_eq!(report.worker_signals, 1);
    }

    #[test]
    fn test_zero_concurrency_runs_one_worker() {
        let dispatcher = Dispatcher::new(RenderConfig::default(), 0);
        assert_eq!(dispatcher.concurrency(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_skips_prerendered_job() {
        let temp = TempDir::new().unwrap();
        let engine = mock_engine(temp.path(), 0.3);
        let jobs = vec![
            scene(temp.path(), "a"),
            scene(temp.path(), "b"),
            scene(temp.path(), "c"),
        ];
        fs::write(jobs[2].output_image_path(), b"png").unwrap();

        let dispatcher = Dispatcher::new(engine.render_config(), 2);
        let report = dispatcher.run(jobs.clone()).await.unwrap();

        assert_eq!(engine.invocations(), 2);
        assert_eq!(report.jobs_total, 3);
        assert_eq!(report.jobs_finished, 3);
        assert_eq!(report.jobs_rendered, 2);
        assert_eq!(report.jobs_skipped, 1);
        assert!(report.parallelism() >= 0.0);
        assert!(!jobs[2].stdout_path().exists());
        assert!(!jobs[2].stats_path().exists());
        for job in &jobs[..2] {
            assert!(job.output_image_path().exists());
            assert!(job.stats_path().exists());
        }
    }

    // Two 0.3s renders on two workers overlap: both start before either ends.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_run_concurrently() {
        let temp = TempDir::new().unwrap();
        let engine = mock_engine(temp.path(), 0.3);
        let jobs = vec![scene(temp.path(), "left"), scene(temp.path(), "right")];

        let dispatcher = Dispatcher::new(engine.render_config(), 2);
        let report = dispatcher.run(jobs).await.unwrap();

        assert_eq!(report.jobs_rendered, 2);
        assert!(report.wall_time >= Duration::from_millis(300));

        let trace = engine.trace();
        assert_eq!(trace.len(), 4);
        let first_end = trace.iter().position(|l| l.starts_with("end ")).unwrap();
        assert_eq!(first_end, 2, "renders ran one after another: {:?}", trace);
    }

    /// Parse a `Duration` printed with `{:?}`, e.g. `1.0042s` or `310µs`
    fn parse_debug_duration(text: &str) -> Duration {
        let (number, unit_nanos) = if let Some(n) = text.strip_suffix("ns") {
            (n, 1)
        } else if let Some(n) = text.strip_suffix("µs") {
            (n, 1_000)
        } else if let Some(n) = text.strip_suffix("ms") {
            (n, 1_000_000)
        } else if let Some(n) = text.strip_suffix('s') {
            (n, 1_000_000_000)
        } else {
            panic!("not a duration: {:?}", text);
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        let mut nanos = whole.parse::<u64>().unwrap() * unit_nanos;
        if !frac.is_empty() {
            let scale = 10u64.pow(frac.len() as u32);
            nanos += frac.parse::<u64>().unwrap() * unit_nanos / scale;
        }
        Duration::from_nanos(nanos)
    }

    fn stats_duration(job: &Job, label: &str) -> Duration {
        let text = fs::read_to_string(job.stats_path()).unwrap();
        let value = text
            .lines()
            .find_map(|line| line.strip_prefix(label))
            .unwrap_or_else(|| panic!("{} missing from {}", label, text));
        parse_debug_duration(value.trim())
    }

    #[test]
    fn test_parse_debug_duration() {
        for d in [
            Duration::ZERO,
            Duration::from_nanos(7),
            Duration::from_micros(310),
            Duration::from_micros(12_345),
            Duration::from_millis(1200),
            Duration::new(3, 1_000),
        ] {
            assert_eq!(parse_debug_duration(&format!("{:?}", d)), d);
        }
    }

    // N CPU-bound renders on N workers: the run totals are exactly the sum of
    // the per-job stats files and the ratio stays within the pool size.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_totals_match_job_stats_for_busy_renders() {
        let temp = TempDir::new().unwrap();
        let engine = busy_engine(temp.path(), 200_000);
        let jobs: Vec<Job> = (0..3)
            .map(|i| scene(temp.path(), &format!("busy_{}", i)))
            .collect();

        let dispatcher = Dispatcher::new(engine.render_config(), 3);
        let report = dispatcher.run(jobs.clone()).await.unwrap();

        assert_eq!(engine.invocations(), 3);
        assert_eq!(report.jobs_rendered, 3);

        let user: Duration = jobs.iter().map(|j| stats_duration(j, "User time:")).sum();
        let system: Duration = jobs.iter().map(|j| stats_duration(j, "System time:")).sum();
        assert_eq!(report.user_time, user);
        assert_eq!(report.system_time, system);
        assert!(user + system > Duration::ZERO);

        let expected = (user + system).as_secs_f64() / report.wall_time.as_secs_f64();
        assert_eq!(report.parallelism(), expected);
        assert!(report.parallelism() > 0.0);
        assert!(report.parallelism() <= 3.1, "ratio {}", report.parallelism());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failing_job_aborts_run() {
        let temp = TempDir::new().unwrap();
        let engine = mock_engine(temp.path(), 0.0);
        let jobs = vec![
            scene(temp.path(), "one"),
            scene(temp.path(), "two"),
            scene(temp.path(), "fail_three"),
            scene(temp.path(), "four"),
            scene(temp.path(), "five"),
        ];
        let failing = jobs[2].source_path().to_path_buf();

        let dispatcher = Dispatcher::new(engine.render_config(), 2);
        let err = dispatcher.run(jobs).await.unwrap_err();

        match err {
            DispatchError::Job(JobError::Render { job, source }) => {
                assert_eq!(job, failing);
                assert!(matches!(source, RenderError::EngineFailed(7)));
            }
            other => panic!("expected render failure, got {:?}", other),
        }
    }
}
