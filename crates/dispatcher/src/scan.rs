//! Input expansion for the scene list.
//!
//! Command-line inputs may name scene files or directories. Directories are
//! walked recursively for `.pov` files, the way the scene generators lay out
//! one directory per demo or map.

use crate::job::Job;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scene file extension picked up from directories (case-insensitive).
pub const SCENE_EXTENSION: &str = "pov";

/// Checks if a file has the scene extension (case-insensitive).
pub fn is_scene_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(SCENE_EXTENSION))
        .unwrap_or(false)
}

/// Recursively collects scene files under `root`, sorted by path.
///
/// Hidden subdirectories (names starting with `.`) are not entered.
pub fn scan_scene_dir(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() && entry.depth() > 0 {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with('.') {
                    return false;
                }
            }
        }
        true
    });

    let mut scenes: Vec<PathBuf> = walker
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_scene_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    scenes.sort();
    scenes
}

/// Expands command-line inputs into the ordered job list.
///
/// - Files are kept as given, in order, whatever their extension
/// - Directories expand to their scene files in sorted order
/// - Paths that do not exist are kept; the engine reports them when it runs
/// - Repeated paths keep their first position only, compared as absolute paths
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<Job> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for input in inputs {
        let paths = if input.is_dir() {
            scan_scene_dir(input)
        } else {
            vec![input.clone()]
        };

        for path in paths {
            // `a.pov` and `./a.pov` share their log files
            let key = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                jobs.push(Job::new(path));
            }
        }
    }

    jobs
}
