//! Session configuration
//!
//! Defaults match a plain `profile_session!()`: a 4096-slot table, a text
//! report in `profile_results.txt`, and a 100ms calibration sleep at close.
//! Configurations can also be loaded from TOML:
//!
//! ```toml
//! output = "target/profile.json"
//! format = "json"
//! capacity = 8192
//! calibration_ms = 50
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ProfilerError, Result};
use crate::report::ReportFormat;
use crate::table::DEFAULT_CAPACITY;

/// Report destination used when none is given
pub const DEFAULT_OUTPUT: &str = "profile_results.txt";

/// Default calibration interval in milliseconds
pub const DEFAULT_CALIBRATION_MS: u64 = 100;

/// Settings for one profiling session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Report destination; `None` keeps the report in memory only
    pub output: Option<PathBuf>,
    /// Report format; inferred from the output extension when unset
    pub format: Option<ReportFormat>,
    /// Number of statistics table slots (slot 0 is reserved)
    pub capacity: usize,
    /// Wall-clock interval slept while calibrating the cycle counter
    pub calibration_ms: u64,
    /// Known cycle counter frequency; skips calibration when set
    pub cpu_freq: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            output: Some(PathBuf::from(DEFAULT_OUTPUT)),
            format: None,
            capacity: DEFAULT_CAPACITY,
            calibration_ms: DEFAULT_CALIBRATION_MS,
            cpu_freq: None,
        }
    }
}

impl SessionConfig {
    /// Default settings without a report file
    pub fn in_memory() -> Self {
        SessionConfig {
            output: None,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_calibration_ms(mut self, ms: u64) -> Self {
        self.calibration_ms = ms;
        self
    }

    pub fn with_cpu_freq(mut self, freq: u64) -> Self {
        self.cpu_freq = Some(freq);
        self
    }

    /// Format to write: explicit setting, else from the output extension
    pub fn resolved_format(&self) -> ReportFormat {
        self.format.unwrap_or_else(|| {
            self.output
                .as_deref()
                .map(ReportFormat::from_path)
                .unwrap_or(ReportFormat::Text)
        })
    }

    /// Parse a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| ProfilerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfilerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            return Err(ProfilerError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}
