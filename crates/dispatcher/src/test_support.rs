//! Shell-script stand-in for povray used by the unit tests.

use crate::config::QualityPreset;
use crate::job::Job;
use crate::render::RenderConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct MockEngine {
    pub path: PathBuf,
    log_path: PathBuf,
    trace_path: PathBuf,
}

impl MockEngine {
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            engine_path: self.path.clone(),
            priority_helper_path: PathBuf::from("/usr/bin/schedtool"),
            use_priority_helper: false,
            quality_preset: QualityPreset::Fast,
        }
    }

    /// Number of times the engine has been started
    pub fn invocations(&self) -> usize {
        fs::read_to_string(&self.log_path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// `begin <scene>` / `end <scene>` lines in the order the engines wrote them
    pub fn trace(&self) -> Vec<String> {
        fs::read_to_string(&self.trace_path)
            .map(|s| s.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

fn install(dir: &Path, body: &str) -> MockEngine {
    let path = dir.join("mock-povray");
    let log_path = dir.join("invocations.log");
    let trace_path = dir.join("trace.log");
    let script = format!(
        r#"#!/bin/sh
for scene; do :; done
echo "$scene" >> "{log}"
echo "begin $scene" >> "{trace}"
{body}
echo "end $scene" >> "{trace}"
case "$scene" in
  *fail*) exit 7 ;;
esac
touch "${{scene%.*}}.png"
"#,
        log = log_path.display(),
        trace = trace_path.display(),
        body = body,
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    MockEngine {
        path,
        log_path,
        trace_path,
    }
}

/// Writes an executable engine into `dir`.
///
/// The engine takes its last argument as the scene, logs the call, sleeps for
/// `delay_secs`, then exits 7 for scenes whose name contains `fail` and
/// otherwise touches `<stem>.png`.
pub fn mock_engine(dir: &Path, delay_secs: f32) -> MockEngine {
    let body = format!(
        "echo \"rendering $scene\"\necho \"parse warning: nothing to see\" >&2\nsleep {}",
        delay_secs
    );
    install(dir, &body)
}

/// Like [`mock_engine`], but spins the CPU for `iterations` loop rounds
/// instead of sleeping.
pub fn busy_engine(dir: &Path, iterations: u32) -> MockEngine {
    let body = format!(
        "i=0\nwhile [ $i -lt {} ]; do i=$((i+1)); done\necho \"rendered $scene\"",
        iterations
    );
    install(dir, &body)
}

/// Creates `<dir>/<stem>.pov` and returns its job
pub fn scene(dir: &Path, stem: &str) -> Job {
    let path = dir.join(format!("{}.pov", stem));
    fs::write(&path, "camera { location <0, 0, -5> }\n").unwrap();
    Job::new(path)
}
