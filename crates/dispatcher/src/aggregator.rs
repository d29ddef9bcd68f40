//! Run-wide CPU time accumulator
//!
//! Workers add each rendered job's CPU times here. The totals are read once,
//! after every worker has stopped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Accumulated totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub user_time: Duration,
    pub system_time: Duration,
    /// Jobs that actually ran the engine (skipped jobs are not counted)
    pub rendered_jobs: u64,
}

impl Totals {
    pub fn cpu_time(&self) -> Duration {
        self.user_time + self.system_time
    }
}

/// Lock-protected accumulator shared by all workers
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: Mutex<Totals>,
}

/// Aggregator handle passed to each worker
pub type SharedAggregator = Arc<Aggregator>;

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new SharedAggregator with zeroed totals
    pub fn shared() -> SharedAggregator {
        Arc::new(Self::new())
    }

    /// Add one rendered job's CPU times
    pub async fn add(&self, user_delta: Duration, system_delta: Duration) {
        let mut totals = self.totals.lock().await;
        totals.user_time += user_delta;
        totals.system_time += system_delta;
        totals.rendered_jobs += 1;
    }

    /// Copy of the current totals
    pub async fn snapshot(&self) -> Totals {
        *self.totals.lock().await
    }
}
