//! Worker module
//!
//! A worker pulls jobs off the shared queue until it is closed and drained,
//! rendering each one and reporting back on the completion channel.

use crate::aggregator::SharedAggregator;
use crate::job::Job;
use crate::render::{run_render, JobLogs, RenderConfig, RenderError};
use crate::stats::JobStats;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Receiving end of the job queue, shared by every worker
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Error type for a single job. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum JobError {
    /// A log file could not be created
    #[error("failed to create {} for {}: {source}", .path.display(), .job.display())]
    LogFile {
        job: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine could not be run or did not exit cleanly
    #[error("failed to render {}: {source}", .job.display())]
    Render {
        job: PathBuf,
        #[source]
        source: RenderError,
    },

    /// The stats file could not be written
    #[error("failed to write stats for {}: {source}", .job.display())]
    Stats {
        job: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking render task panicked
    #[error("render task for {} panicked: {message}", .job.display())]
    Panicked { job: PathBuf, message: String },
}

impl JobError {
    /// Scene file of the failing job
    pub fn job_path(&self) -> &PathBuf {
        match self {
            JobError::LogFile { job, .. }
            | JobError::Render { job, .. }
            | JobError::Stats { job, .. }
            | JobError::Panicked { job, .. } => job,
        }
    }
}

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Output image already existed; nothing was run or written
    Skipped,
    /// Engine ran to completion
    Rendered(JobStats),
}

impl JobOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            JobOutcome::Skipped => "skipped",
            JobOutcome::Rendered(_) => "rendered",
        }
    }
}

/// Messages a worker sends to the dispatcher
#[derive(Debug)]
pub enum WorkerEvent {
    /// One job is done, rendered or skipped
    JobFinished {
        worker: usize,
        job: Job,
        outcome: JobOutcome,
    },
    /// The queue is closed and empty; sent exactly once per worker
    WorkerExhausted { worker: usize },
    /// A job failed; the worker stops after sending this
    Fatal { worker: usize, error: JobError },
}

/// One member of the worker pool
pub struct Worker {
    id: usize,
    config: Arc<RenderConfig>,
    queue: SharedQueue,
    aggregator: SharedAggregator,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<RenderConfig>,
        queue: SharedQueue,
        aggregator: SharedAggregator,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            config,
            queue,
            aggregator,
            events,
        }
    }

    /// Pull and execute jobs until the queue is exhausted
    ///
    /// Send errors are ignored: a closed completion channel means the
    /// dispatcher has already given up on the run.
    pub async fn run(self) {
        while let Some(job) = self.next_job().await {
            match self.execute(&job).await {
                Ok(outcome) => {
                    let _ = self.events.send(WorkerEvent::JobFinished {
                        worker: self.id,
                        job,
                        outcome,
                    });
                }
                Err(error) => {
                    let _ = self.events.send(WorkerEvent::Fatal {
                        worker: self.id,
                        error,
                    });
                    return;
                }
            }
        }

        debug!(worker = self.id, "queue exhausted");
        let _ = self.events.send(WorkerEvent::WorkerExhausted { worker: self.id });
    }

    async fn next_job(&self) -> Option<Job> {
        let mut rx = self.queue.lock().await;
        rx.recv().await
    }

    /// Execute one job: skip check, log files, engine run, stats, aggregate update
    pub async fn execute(&self, job: &Job) -> Result<JobOutcome, JobError> {
        if job.is_satisfied() {
            debug!(
                worker = self.id,
                job = %job.source_path().display(),
                "output exists, skipping"
            );
            return Ok(JobOutcome::Skipped);
        }

        let logs = JobLogs {
            stdout: create_log(job, job.stdout_path())?,
            stderr: create_log(job, job.stderr_path())?,
        };
        let stats_file = create_log(job, job.stats_path())?;

        info!(worker = self.id, job = %job.source_path().display(), "rendering");

        let config = self.config.clone();
        let render_job = job.clone();
        let run = tokio::task::spawn_blocking(move || run_render(&config, &render_job, logs))
            .await
            .map_err(|e| JobError::Panicked {
                job: job.source_path().to_path_buf(),
                message: e.to_string(),
            })?
            .map_err(|source| JobError::Render {
                job: job.source_path().to_path_buf(),
                source,
            })?;

        let stats = JobStats::from(&run);
        stats
            .write_to(BufWriter::new(stats_file))
            .map_err(|source| JobError::Stats {
                job: job.source_path().to_path_buf(),
                source,
            })?;

        self.aggregator
            .add(stats.user_time(), stats.system_time())
            .await;

        info!(
            worker = self.id,
            job = %job.source_path().display(),
            wall = ?stats.wall_time,
            user = ?stats.user_time(),
            system = ?stats.system_time(),
            "rendered"
        );

        Ok(JobOutcome::Rendered(stats))
    }
}

fn create_log(job: &Job, path: PathBuf) -> Result<File, JobError> {
    File::create(&path).map_err(|source| JobError::LogFile {
        job: job.source_path().to_path_buf(),
        path,
        source,
    })
}
