use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default crash threshold on raw acceleration magnitude (m/s²)
pub const DEFAULT_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionState {
    /// Next magnitude above threshold fires an event
    Armed,
    /// An event fired and its alert cycle has not finished yet
    Triggered,
}

/// Edge-triggered accident signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentEvent {
    pub detected_at: DateTime<Utc>,
    pub magnitude: f64, // m/s^2
}

/// Single-shot threshold detector.
///
/// Fires at most once until [`Detector::rearm`] is called. There is no
/// cool-down: a magnitude above threshold on the very next sample after a
/// re-arm fires again.
#[derive(Debug, Clone)]
pub struct Detector {
    threshold: f64,
    state: DetectionState,
}

impl Detector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: DetectionState::Armed,
        }
    }

    pub fn evaluate(&mut self, magnitude: f64) -> Option<AccidentEvent> {
        match self.state {
            DetectionState::Armed if magnitude > self.threshold => {
                self.state = DetectionState::Triggered;
                log::info!(
                    "Impact detected: {:.2} m/s² > {:.2} m/s²",
                    magnitude,
                    self.threshold
                );
                Some(AccidentEvent {
                    detected_at: Utc::now(),
                    magnitude,
                })
            }
            _ => None,
        }
    }

    /// Allow the detector to fire again. Returns true if it was triggered.
    pub fn rearm(&mut self) -> bool {
        let was_triggered = self.state == DetectionState::Triggered;
        self.state = DetectionState::Armed;
        was_triggered
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
