//! Configuration loading and management

use anyhow::{bail, Result};
use voice_arbiter::capture::{CaptureConfig, DEFAULT_LANGUAGE};

const LANG_VAR: &str = "VOICE_ARBITER_LANG";
const CAPTURE_VAR: &str = "VOICE_ARBITER_CAPTURE";
const CONTINUOUS_VAR: &str = "VOICE_ARBITER_CONTINUOUS";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings the capture device is opened with
    pub capture: CaptureConfig,

    /// Whether the platform reports speech capture support
    pub capture_enabled: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let language = lookup(LANG_VAR)
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let capture_enabled = match lookup(CAPTURE_VAR) {
            Some(value) => parse_flag(CAPTURE_VAR, &value)?,
            None => true,
        };

        let continuous = match lookup(CONTINUOUS_VAR) {
            Some(value) => parse_flag(CONTINUOUS_VAR, &value)?,
            None => true,
        };

        Ok(Self {
            capture: CaptureConfig {
                language,
                continuous,
                interim_results: false,
            },
            capture_enabled,
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got `{}`", key, other),
    }
}
