//! Job descriptor module
//!
//! A job is one scene file. Every artifact path the dispatcher touches is
//! derived from the scene path.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Extension of the image the engine writes next to the scene file.
pub const OUTPUT_IMAGE_EXTENSION: &str = "png";

/// Appends a suffix to the full path, keeping the original extension.
///
/// For example: `/scenes/demo1/frame_0001.pov` + `.stdout` -> `/scenes/demo1/frame_0001.pov.stdout`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.as_os_str().to_owned();
    out.push(suffix);
    PathBuf::from(out)
}

/// One unit of work: a scene file to be rendered into one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    source_path: PathBuf,
}

impl Job {
    pub fn new<P: Into<PathBuf>>(source_path: P) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    /// Path to the scene file
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Image the engine produces: same stem, `.png` extension
    pub fn output_image_path(&self) -> PathBuf {
        self.source_path.with_extension(OUTPUT_IMAGE_EXTENSION)
    }

    pub fn stdout_path(&self) -> PathBuf {
        with_suffix(&self.source_path, ".stdout")
    }

    pub fn stderr_path(&self) -> PathBuf {
        with_suffix(&self.source_path, ".stderr")
    }

    pub fn stats_path(&self) -> PathBuf {
        with_suffix(&self.source_path, ".stats")
    }

    /// Directory the engine runs in
    ///
    /// A bare file name has an empty parent, which maps to the current directory.
    pub fn working_dir(&self) -> &Path {
        match self.source_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Scene file name relative to [`Job::working_dir`]
    pub fn file_name(&self) -> &OsStr {
        self.source_path
            .file_name()
            .unwrap_or_else(|| self.source_path.as_os_str())
    }

    /// Whether the output image already exists, making the job a no-op.
    pub fn is_satisfied(&self) -> bool {
        self.output_image_path().exists()
    }
}
