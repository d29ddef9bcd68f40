//! Configuration module for the POV-Ray batch dispatcher
//!
//! Handles loading configuration from TOML files, environment variable overrides,
//! and mapping the quality flags onto a fixed engine preset.

pub mod config;

pub use config::*;
