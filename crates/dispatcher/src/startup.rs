//! Startup checks module
//!
//! Preflight checks run before any job is dispatched:
//! - The rendering engine binary exists and is executable
//! - The priority helper exists and is executable, when it is in use

use crate::render::RenderConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("rendering engine not usable: {0}")]
    EngineUnavailable(String),

    #[error("priority helper not usable: {0}")]
    PriorityHelperUnavailable(String),
}

/// Resolve a configured program the way the process spawner will
///
/// A bare name such as `povray` is searched for in `PATH`; anything with a
/// directory component is used as given.
pub fn resolve_program(path: &Path) -> Result<PathBuf, String> {
    let bare_name = path.parent().map_or(true, |dir| dir.as_os_str().is_empty());
    if bare_name {
        which::which(path)
            .map_err(|e| format!("{} not found in PATH: {}", path.display(), e))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Check that `path` names an executable regular file
///
/// Returns a human-readable reason when it does not.
pub fn check_executable(path: &Path) -> Result<(), String> {
    let path = resolve_program(path)?;
    let metadata = std::fs::metadata(&path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;

    if !metadata.is_file() {
        return Err(format!("{} is not a regular file", path.display()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("{} is not executable", path.display()));
        }
    }

    Ok(())
}

/// Run all startup checks in order
///
/// 1. Engine binary
/// 2. Priority helper, only when `use_priority_helper` is set
pub fn run_startup_checks(cfg: &RenderConfig) -> Result<(), StartupError> {
    check_executable(&cfg.engine_path).map_err(StartupError::EngineUnavailable)?;

    if cfg.use_priority_helper {
        check_executable(&cfg.priority_helper_path)
            .map_err(StartupError::PriorityHelperUnavailable)?;
    }

    Ok(())
}
