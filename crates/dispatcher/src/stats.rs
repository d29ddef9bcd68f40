//! Per-job stats file
//!
//! Written next to the scene as `<scene>.stats` once the engine has exited
//! successfully.

use crate::render::RenderRun;
use crate::usage::ResourceUsage;
use std::io::{self, Write};
use std::time::Duration;

/// Measurements for one rendered job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    /// Platform wait status
    pub raw_status: i32,
    pub usage: ResourceUsage,
    pub wall_time: Duration,
}

impl JobStats {
    pub fn user_time(&self) -> Duration {
        self.usage.user_time
    }

    pub fn system_time(&self) -> Duration {
        self.usage.system_time
    }

    /// Write the human-readable stats record
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "Wait status: {}", self.raw_status)?;
        writeln!(out, "Resource usage: {:?}", self.usage)?;
        writeln!(out, "System time: {:?}", self.system_time())?;
        writeln!(out, "User time: {:?}", self.user_time())?;
        writeln!(out, "Real time: {:?}", self.wall_time)?;
        out.flush()
    }
}

impl From<&RenderRun> for JobStats {
    fn from(run: &RenderRun) -> Self {
        Self {
            raw_status: run.child.raw_status,
            usage: run.child.usage,
            wall_time: run.wall_time,
        }
    }
}
