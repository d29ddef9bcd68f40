//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Render quality preset handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    /// Small preview render, no antialiasing
    Fast,
    /// Full resolution with antialiasing and extra recursion depth
    HighQuality,
    /// Full resolution, engine default quality
    Default,
}

impl QualityPreset {
    /// Select the preset from the two quality flags. `fast` wins over `high_quality`.
    pub fn from_flags(fast: bool, high_quality: bool) -> Self {
        if fast {
            QualityPreset::Fast
        } else if high_quality {
            QualityPreset::HighQuality
        } else {
            QualityPreset::Default
        }
    }

    /// Engine flags for this preset
    pub fn engine_flags(&self) -> &'static [&'static str] {
        match self {
            QualityPreset::Fast => &["+Q2", "+W400", "+H225"],
            QualityPreset::HighQuality => &["+Q11", "+A0.3", "+R4", "+W1600", "+H900"],
            QualityPreset::Default => &["+W1600", "+H900"],
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::HighQuality => "high-quality",
            QualityPreset::Default => "default",
        }
    }
}

/// Rendering engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Path to the povray binary
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("/usr/bin/povray")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
        }
    }
}

/// Scheduling priority configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityConfig {
    /// Path to the schedtool binary
    #[serde(default = "default_helper_path")]
    pub helper_path: PathBuf,
    /// Run the engine at idle priority through the helper (default true)
    #[serde(default = "default_use_idle_priority")]
    pub use_idle_priority: bool,
}

fn default_helper_path() -> PathBuf {
    PathBuf::from("/usr/bin/schedtool")
}

fn default_use_idle_priority() -> bool {
    true
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            helper_path: default_helper_path(),
            use_idle_priority: default_use_idle_priority(),
        }
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Number of engines to run in parallel (<= 0 = number of CPUs)
    #[serde(default = "default_concurrency")]
    pub concurrency: i32,
}

fn default_concurrency() -> i32 {
    -1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Quality flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Fast preview rendering (default false)
    #[serde(default)]
    pub fast: bool,
    /// High quality rendering (default true)
    #[serde(default = "default_high_quality")]
    pub high_quality: bool,
}

fn default_high_quality() -> bool {
    true
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            fast: false,
            high_quality: default_high_quality(),
        }
    }
}

impl QualityConfig {
    pub fn preset(&self) -> QualityPreset {
        QualityPreset::from_flags(self.fast, self.high_quality)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

/// Parse a boolean environment value. Accepts "true", "1", "yes" and "false", "0", "no".
fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - POV_DISPATCH_ENGINE_PATH -> engine.path
    /// - POV_DISPATCH_PRIORITY_HELPER_PATH -> priority.helper_path
    /// - POV_DISPATCH_USE_IDLE_PRIORITY -> priority.use_idle_priority
    /// - POV_DISPATCH_CONCURRENCY -> dispatch.concurrency
    /// - POV_DISPATCH_FAST -> quality.fast
    /// - POV_DISPATCH_HIGH_QUALITY -> quality.high_quality
    ///
    /// Values that fail to parse leave the existing setting alone.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("POV_DISPATCH_ENGINE_PATH") {
            if !val.is_empty() {
                self.engine.path = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("POV_DISPATCH_PRIORITY_HELPER_PATH") {
            if !val.is_empty() {
                self.priority.helper_path = PathBuf::from(val);
            }
        }

        if let Some(idle) = env::var("POV_DISPATCH_USE_IDLE_PRIORITY")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            self.priority.use_idle_priority = idle;
        }

        if let Ok(val) = env::var("POV_DISPATCH_CONCURRENCY") {
            if let Ok(n) = val.parse::<i32>() {
                self.dispatch.concurrency = n;
            }
        }

        if let Some(fast) = env::var("POV_DISPATCH_FAST").ok().and_then(|v| parse_bool(&v)) {
            self.quality.fast = fast;
        }

        if let Some(hq) = env::var("POV_DISPATCH_HIGH_QUALITY")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            self.quality.high_quality = hq;
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Built-in defaults with environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}
