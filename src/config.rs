//! Tunable thresholds for the pipeline, persisted as JSON.
//!
//! Mirrors the load/save shape used elsewhere in this style of CLI tool:
//! `serde_json::to_string_pretty`/`from_str` against a file in a resolved
//! config directory, with environment-variable overrides layered on top of
//! whatever was loaded from disk.

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// All thresholds the pipeline and its subsystems consult. Defaults
/// reproduce the documented design defaults exactly.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// VT scrollback cap, in lines. `0` means unlimited.
    pub scrollback_limit: usize,
    /// Minimum contiguous block length the deduplicator treats as a redraw.
    pub min_match: usize,
    /// Timing-gap signal threshold, in seconds.
    pub timing_gap_seconds: f64,
    /// Score assigned to a `screen_clear` signal.
    pub screen_clear_score: f64,
    /// Score assigned to an `alt_screen_exit` signal.
    pub alt_screen_exit_score: f64,
    /// Minimum quiet period before a burst counts as `volume_burst`, in seconds.
    pub volume_burst_quiet_seconds: f64,
    /// Minimum payload size for a `volume_burst` signal, in bytes.
    pub volume_burst_min_bytes: usize,
    /// Section boundaries within this many events of each other merge.
    pub merge_window_events: usize,
    /// Sessions below this many events produce no detected boundaries.
    pub min_session_size: usize,
    /// Hard cap on detected section boundaries per session.
    pub max_sections: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scrollback_limit: 200_000,
            min_match: 3,
            timing_gap_seconds: 5.0,
            screen_clear_score: 10.0,
            alt_screen_exit_score: 10.0,
            volume_burst_quiet_seconds: 1.0,
            volume_burst_min_bytes: 4096,
            merge_window_events: 16,
            min_session_size: 100,
            max_sections: 50,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from `path`, falling back to defaults if the
    /// file does not exist. Applies `RAGTS_*` environment overrides on top.
    pub fn load(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RAGTS_SCROLLBACK_LIMIT") {
            if let Ok(n) = v.parse() {
                self.scrollback_limit = n;
            }
        }
        if let Ok(v) = std::env::var("RAGTS_MIN_MATCH") {
            if let Ok(n) = v.parse() {
                self.min_match = n;
            }
        }
        if let Ok(v) = std::env::var("RAGTS_TIMING_GAP_SECONDS") {
            if let Ok(n) = v.parse() {
                self.timing_gap_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("RAGTS_MAX_SECTIONS") {
            if let Ok(n) = v.parse() {
                self.max_sections = n;
            }
        }
    }

    /// Persists the configuration to `path` as pretty-printed JSON.
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
