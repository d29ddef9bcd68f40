//! CLI entry point for the POV-Ray batch dispatcher
//!
//! Parses command line arguments, resolves the run configuration and renders
//! every scene given on the command line.

use clap::Parser;
use pov_dispatch::{
    concurrency_from_config, expand_inputs, run_startup_checks, Config, ConfigError, Dispatcher,
    RenderConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Render many POV-Ray scene files in parallel
#[derive(Parser, Debug)]
#[command(name = "pov-dispatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to povray [default: /usr/bin/povray]
    #[arg(long)]
    engine_path: Option<PathBuf>,

    /// Path to schedtool [default: /usr/bin/schedtool]
    #[arg(long)]
    priority_helper_path: Option<PathBuf>,

    /// Run this many renders in parallel; <= 0 means one per CPU [default: -1]
    #[arg(long, allow_negative_numbers = true)]
    concurrency: Option<i32>,

    /// Fast, low resolution rendering [default: false]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    fast: Option<bool>,

    /// High quality rendering [default: true]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    high_quality: Option<bool>,

    /// Run povray at idle priority through schedtool [default: true]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    use_idle_priority: Option<bool>,

    /// Also write the final report as JSON to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Skip the engine and priority helper checks
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Scene files, or directories to search for .pov files
    scenes: Vec<PathBuf>,
}

impl Args {
    /// Defaults < config file < environment < command line
    fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env(),
        };

        if let Some(path) = &self.engine_path {
            config.engine.path = path.clone();
        }
        if let Some(path) = &self.priority_helper_path {
            config.priority.helper_path = path.clone();
        }
        if let Some(idle) = self.use_idle_priority {
            config.priority.use_idle_priority = idle;
        }
        if let Some(n) = self.concurrency {
            config.dispatch.concurrency = n;
        }
        if let Some(fast) = self.fast {
            config.quality.fast = fast;
        }
        if let Some(hq) = self.high_quality {
            config.quality.high_quality = hq;
        }

        Ok(config)
    }

    /// An empty batch never starts the engine, so there is nothing to check
    fn wants_startup_checks(&self, job_count: usize) -> bool {
        !self.skip_checks && job_count > 0
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pov_dispatch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let render_config = RenderConfig::from_config(&config);
    let concurrency = concurrency_from_config(&config);

    let jobs = expand_inputs(&args.scenes);

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else if args.wants_startup_checks(jobs.len()) {
        if let Err(e) = run_startup_checks(&render_config) {
            error!("Startup check failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!(
        engine = %render_config.engine_path.display(),
        idle_priority = render_config.use_priority_helper,
        preset = render_config.quality_preset.as_str(),
        "{} scenes queued",
        jobs.len()
    );

    let dispatcher = Dispatcher::new(render_config, concurrency);
    let report = match dispatcher.run(jobs).await {
        Ok(report) => report,
        Err(e) => {
            error!("Render run aborted: {}", e);
            // Engines still running on other workers would keep the runtime
            // from shutting down; leave them behind.
            std::process::exit(1);
        }
    };

    println!("{}", report);

    if let Some(path) = &args.summary_json {
        if let Err(e) = report.write_summary_json(path) {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use pov_dispatch::QualityPreset;

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::parse_from(["pov-dispatch", "a.pov", "b.pov"]);
        assert_eq!(args.scenes, vec![PathBuf::from("a.pov"), PathBuf::from("b.pov")]);
        assert_eq!(args.fast, None);
        assert_eq!(args.high_quality, None);
        assert_eq!(args.use_idle_priority, None);
        assert!(!args.skip_checks);
    }

    #[test]
    fn test_bool_flags_with_and_without_values() {
        let args = Args::parse_from([
            "pov-dispatch",
            "--fast",
            "--high-quality=false",
            "--use-idle-priority=false",
            "scene.pov",
        ]);
        assert_eq!(args.fast, Some(true));
        assert_eq!(args.high_quality, Some(false));
        assert_eq!(args.use_idle_priority, Some(false));
        assert_eq!(args.scenes, vec![PathBuf::from("scene.pov")]);
    }

    #[test]
    fn test_negative_concurrency_is_accepted() {
        let args = Args::parse_from(["pov-dispatch", "--concurrency", "-1"]);
        assert_eq!(args.concurrency, Some(-1));
        assert!(args.scenes.is_empty());
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("render.toml");
        std::fs::write(
            &path,
            r#"
[engine]
path = "/opt/povray/bin/povray"

[dispatch]
concurrency = 2

[quality]
fast = true
"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "pov-dispatch".to_string(),
            "--config".to_string(),
            path.display().to_string(),
            "--concurrency".to_string(),
            "6".to_string(),
            "--fast=false".to_string(),
            "--use-idle-priority=false".to_string(),
        ]);
        let config = args.resolve_config().unwrap();

        let render = RenderConfig::from_config(&config);
        assert_eq!(render.engine_path, PathBuf::from("/opt/povray/bin/povray"));
        assert!(!render.use_priority_helper);
        assert_eq!(render.quality_preset, QualityPreset::HighQuality);
        assert_eq!(concurrency_from_config(&config), 6);
    }

    #[test]
    fn test_startup_checks_only_for_non_empty_batches() {
        let args = Args::parse_from(["pov-dispatch"]);
        assert!(!args.wants_startup_checks(0));
        assert!(args.wants_startup_checks(3));

        let skipped = Args::parse_from(["pov-dispatch", "--skip-checks", "scene.pov"]);
        assert!(!skipped.wants_startup_checks(1));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::parse_from(["pov-dispatch", "--config", "/nonexistent/render.toml"]);
        assert!(matches!(args.resolve_config(), Err(ConfigError::Io(_))));
    }
}
