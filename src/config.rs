use crate::detector::DEFAULT_THRESHOLD;
use crate::error::{MonitorError, MonitorResult};
use crate::location::{LocationRequest, ProviderFailurePolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the monitoring core. Defaults match the deployed app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Crash threshold on acceleration magnitude (m/s²)
    pub threshold: f64,
    /// Parameters of the fallback high-accuracy request
    pub location: LocationRequest,
    /// What to do when the cached-position lookup itself errors
    pub provider_failure: ProviderFailurePolicy,
    /// Give up on the fallback fix after this many seconds (None = wait forever)
    pub fix_timeout_secs: Option<u64>,
    /// Accelerometer poll period for polling feeds (ms)
    pub sample_interval_ms: u64,
    /// Capacity of the sample channel; a full channel drops new samples
    pub sample_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            location: LocationRequest::default(),
            provider_failure: ProviderFailurePolicy::default(),
            fix_timeout_secs: Some(60),
            sample_interval_ms: 200, // SENSOR_DELAY_NORMAL
            sample_buffer: 500,
        }
    }
}

impl MonitorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> MonitorResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(MonitorError::InvalidParameters(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if self.location.interval_ms == 0 || self.location.fastest_interval_ms == 0 {
            return Err(MonitorError::InvalidParameters(
                "location intervals must be non-zero".to_string(),
            ));
        }
        if self.location.num_updates == 0 {
            return Err(MonitorError::InvalidParameters(
                "location request must ask for at least one update".to_string(),
            ));
        }
        if self.sample_interval_ms == 0 || self.sample_buffer == 0 {
            return Err(MonitorError::InvalidParameters(
                "sample interval and buffer must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fix_timeout(&self) -> Option<Duration> {
        self.fix_timeout_secs.map(Duration::from_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}
