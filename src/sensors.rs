use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Accelerometer sample (m/s², timestamp in seconds since epoch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub timestamp: f64,
}

impl AccelSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self { x, y, z, timestamp }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Turns raw samples into magnitudes for the detector
#[derive(Debug, Default)]
pub struct MotionSampler {
    last_magnitude: Option<f64>,
    peak_magnitude: f64,
}

impl MotionSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sample(&mut self, sample: &AccelSample) -> f64 {
        let magnitude = sample.magnitude();
        log::trace!("Acceleration: {:.3} m/s²", magnitude);

        self.last_magnitude = Some(magnitude);
        if magnitude > self.peak_magnitude {
            self.peak_magnitude = magnitude;
        }
        magnitude
    }

    pub fn last_magnitude(&self) -> Option<f64> {
        self.last_magnitude
    }

    pub fn peak_magnitude(&self) -> f64 {
        self.peak_magnitude
    }
}

/// Push stream of accelerometer samples.
///
/// The controller subscribes when monitoring starts or the host returns to the
/// foreground, and unsubscribes when the host leaves it. Dropping the receiver
/// is not enough to stop a feed; `unsubscribe` must release whatever produces
/// the samples.
pub trait SensorFeed: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Start delivering samples. Calling this while already subscribed
    /// replaces the previous subscription.
    fn subscribe(&mut self) -> Result<mpsc::Receiver<AccelSample>, SensorError>;

    /// Stop delivering samples. No-op when not subscribed.
    fn unsubscribe(&mut self);
}
