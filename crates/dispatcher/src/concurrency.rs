//! Worker pool sizing
//!
//! Resolves the requested concurrency against the host CPU count.

use crate::config::Config;

/// Number of workers to launch for a requested concurrency
///
/// A non-positive request means "one worker per logical CPU", detected via num_cpus.
pub fn resolve_concurrency(requested: i32) -> usize {
    resolve_with_cores(requested, num_cpus::get())
}

/// Resolve the worker count from the dispatch section of a configuration
pub fn concurrency_from_config(cfg: &Config) -> usize {
    resolve_concurrency(cfg.dispatch.concurrency)
}

fn resolve_with_cores(requested: i32, cores: usize) -> usize {
    if requested > 0 {
        requested as usize
    } else {
        cores.max(1)
    }
}
