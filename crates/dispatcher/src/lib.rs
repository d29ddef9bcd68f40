//! POV-Ray batch dispatcher
//!
//! Renders a batch of scene files on a fixed pool of workers, skipping scenes
//! whose image already exists, and reports how well the CPUs were kept busy.

pub mod aggregator;
pub mod concurrency;
pub mod dispatcher;
pub mod job;
pub mod render;
pub mod report;
pub mod scan;
pub mod startup;
pub mod stats;
pub mod usage;
pub mod worker;

#[cfg(all(test, unix))]
mod test_support;

pub use aggregator::{Aggregator, SharedAggregator, Totals};
pub use concurrency::{concurrency_from_config, resolve_concurrency};
pub use dispatcher::{DispatchError, Dispatcher};
pub use job::Job;
pub use pov_dispatch_config as config;
pub use pov_dispatch_config::{Config, ConfigError, QualityPreset};
pub use render::{build_render_command, run_render, RenderConfig, RenderError};
pub use report::{parallelism, RunReport, RunSummary, SummaryError};
pub use scan::{expand_inputs, scan_scene_dir};
pub use startup::{run_startup_checks, StartupError};
pub use stats::JobStats;
pub use usage::{wait_with_usage, ResourceUsage};
pub use worker::{JobError, JobOutcome, Worker, WorkerEvent};
