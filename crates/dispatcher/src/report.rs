//! End-of-run efficiency report

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for writing the JSON run summary
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write run summary: {0}")]
    Io(#[from] std::io::Error),
}

/// Totals for one finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub wall_time: Duration,
    pub user_time: Duration,
    pub system_time: Duration,
    /// Jobs submitted to the queue
    pub jobs_total: usize,
    /// Jobs reported finished (rendered + skipped)
    pub jobs_finished: usize,
    pub jobs_rendered: u64,
    pub jobs_skipped: usize,
    /// Workers launched
    pub concurrency: usize,
    /// Queue-exhaustion signals received; equals `concurrency` on a clean run
    pub worker_signals: usize,
}

impl RunReport {
    /// CPU time spent per unit of wall time
    ///
    /// Close to `concurrency` means the pool was kept busy, close to 1.0 means
    /// the run was effectively serial. Zero wall time yields 0.0.
    pub fn parallelism(&self) -> f64 {
        parallelism(self.user_time, self.system_time, self.wall_time)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            wall_secs: self.wall_time.as_secs_f64(),
            user_secs: self.user_time.as_secs_f64(),
            system_secs: self.system_time.as_secs_f64(),
            parallelism: self.parallelism(),
            jobs_total: self.jobs_total,
            jobs_rendered: self.jobs_rendered,
            jobs_skipped: self.jobs_skipped,
            concurrency: self.concurrency,
        }
    }

    /// Write the summary as pretty-printed JSON
    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SummaryError> {
        let json = serde_json::to_string_pretty(&self.summary())?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total time: {:?} ({:?} user + {:?} system = {:.3} parallelism)",
            self.wall_time,
            self.user_time,
            self.system_time,
            self.parallelism()
        )
    }
}

/// Machine-readable form of [`RunReport`], durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub wall_secs: f64,
    pub user_secs: f64,
    pub system_secs: f64,
    pub parallelism: f64,
    pub jobs_total: usize,
    pub jobs_rendered: u64,
    pub jobs_skipped: usize,
    pub concurrency: usize,
}

/// `(user + system) / wall`
pub fn parallelism(user: Duration, system: Duration, wall: Duration) -> f64 {
    let wall = wall.as_secs_f64();
    if wall <= 0.0 {
        return 0.0;
    }
    (user + system).as_secs_f64() / wall
}
