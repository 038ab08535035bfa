//! Configuration file support for fillout.
//!
//! Loads defaults from `fillout.toml` in the working directory, or from the
//! file given with `--config`. Command line flags win over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "fillout.toml";

/// Settings loaded from `fillout.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FillConfig {
    /// Per-request timeout, e.g. "30s"
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub verbose: Option<bool>,
    /// pretty, json or compact
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub trace_file: Option<PathBuf>,
    /// Replay file written by `record` and read by `replay`
    pub replay_file: Option<PathBuf>,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub record: RecordConfig,
}

/// Defaults for `complete` and `replay`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub concurrency: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub wait_time: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub stagger: Option<Duration>,
    pub max_steps: Option<usize>,
    pub respondent_key: Option<String>,
}

/// Defaults for `record`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RecordConfig {
    pub port: Option<u16>,
    pub open_browser: Option<bool>,
}

impl FillConfig {
    /// Load configuration.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if the file exists and parses successfully
    /// - `Ok(None)` if no explicit path was given and `fillout.toml` does not exist
    /// - `Err(...)` if the file fails to parse, or an explicit path is missing
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Option<Self>> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = working_dir.join(CONFIG_FILE_NAME);
                if !default_path.exists() {
                    return Ok(None);
                }
                default_path
            }
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
