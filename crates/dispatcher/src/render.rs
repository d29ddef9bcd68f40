//! POV-Ray invocation module
//!
//! Builds the engine command line for a job and runs it to completion,
//! redirecting console output into the job's log files.

use crate::config::{Config, QualityPreset};
use crate::job::Job;
use crate::usage::{wait_with_usage, ChildOutcome};
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Engine flag selecting unattended rendering (no preview display)
const UNATTENDED_FLAG: &str = "-D";

/// schedtool arguments that run the trailing command under SCHED_IDLEPRIO
const IDLE_PRIORITY_ARGS: &[&str] = &["-D", "-e"];

/// Error type for engine invocations
#[derive(Debug, Error)]
pub enum RenderError {
    /// Engine (or priority helper) could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the engine process failed
    #[error("failed to wait for engine: {0}")]
    Wait(#[source] std::io::Error),

    /// Engine exited with non-zero status
    #[error("engine failed with exit code: {0}")]
    EngineFailed(i32),

    /// Engine was terminated by a signal
    #[error("engine was terminated by signal")]
    EngineTerminated,
}

/// Immutable per-run render settings, shared read-only by every worker
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub engine_path: PathBuf,
    pub priority_helper_path: PathBuf,
    pub use_priority_helper: bool,
    pub quality_preset: QualityPreset,
}

impl RenderConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            engine_path: cfg.engine.path.clone(),
            priority_helper_path: cfg.priority.helper_path.clone(),
            use_priority_helper: cfg.priority.use_idle_priority,
            quality_preset: cfg.quality.preset(),
        }
    }

    /// Program actually executed for a job
    pub fn program(&self) -> &PathBuf {
        if self.use_priority_helper {
            &self.priority_helper_path
        } else {
            &self.engine_path
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Output handles for one job's console streams
#[derive(Debug)]
pub struct JobLogs {
    pub stdout: File,
    pub stderr: File,
}

/// Result of one successful engine run
#[derive(Debug, Clone, Copy)]
pub struct RenderRun {
    pub child: ChildOutcome,
    /// Wall time from just before spawn to just after the child was reaped
    pub wall_time: Duration,
}

/// Build the engine command for a job
///
/// Layout:
/// - with priority helper: `<helper> -D -e <engine> <engine args>`
/// - without: `<engine> <engine args>`
///
/// Engine args are the unattended flag, the preset flags, then the scene's
/// file name. The command runs inside the scene's directory.
pub fn build_render_command(cfg: &RenderConfig, job: &Job) -> Command {
    let mut cmd = Command::new(cfg.program());

    if cfg.use_priority_helper {
        cmd.args(IDLE_PRIORITY_ARGS);
        cmd.arg(&cfg.engine_path);
    }

    cmd.arg(UNATTENDED_FLAG);
    cmd.args(cfg.quality_preset.engine_flags());
    cmd.arg(job.file_name());
    cmd.current_dir(job.working_dir());

    cmd
}

/// Run the engine for a job, blocking until it exits
///
/// # Errors
/// Returns an error if:
/// - The process fails to start
/// - Waiting on the process fails
/// - The process exits with non-zero status or is killed by a signal
pub fn run_render(
    cfg: &RenderConfig,
    job: &Job,
    logs: JobLogs,
) -> Result<RenderRun, RenderError> {
    let mut cmd = build_render_command(cfg, job);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(logs.stdout))
        .stderr(Stdio::from(logs.stderr));

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| RenderError::Spawn {
        program: cfg.program().display().to_string(),
        source,
    })?;
    // Drop our copies of the log handles; the child holds its own.
    drop(cmd);

    let outcome = wait_with_usage(&mut child).map_err(RenderError::Wait)?;
    let wall_time = started.elapsed();

    if outcome.status.success() {
        Ok(RenderRun {
            child: outcome,
            wall_time,
        })
    } else {
        match outcome.status.code() {
            Some(code) => Err(RenderError::EngineFailed(code)),
            None => Err(RenderError::EngineTerminated),
        }
    }
}
