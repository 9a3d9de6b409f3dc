//! Session tuning.

use std::time::Duration;

use serde::Deserialize;

/// Where waveform previews start evaluating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewMode {
    /// Evaluate the requested sample window as-is.
    #[default]
    Timeline,
    /// Evaluate from sample 0 regardless of the requested start, showing how
    /// the currently held notes sound from onset.
    Instrument,
}

/// Tuning for one shader session. Every field has a default, so a TOML file
/// only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Generation rate for offline sinks. Real devices use their own rate.
    pub sample_rate: u32,
    /// Audio kept generated ahead of the device clock.
    pub look_ahead_seconds: f64,
    /// Minimum lead between "now" and a block's start, absorbing jitter.
    pub safety_margin_seconds: f64,
    /// Length of one generated block before the backend limit applies.
    pub block_seconds: f64,
    /// Ticks between state-hash checks for the waveform cache.
    pub hash_interval_ticks: u32,
    /// Bounded readiness wait on init and source change.
    pub ready_timeout_ms: u64,
    pub preview_mode: PreviewMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            look_ahead_seconds: 0.5,
            safety_margin_seconds: 0.05,
            block_seconds: 0.1,
            hash_interval_ticks: 6,
            ready_timeout_ms: 3000,
            preview_mode: PreviewMode::Timeline,
        }
    }
}

impl SessionConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}
