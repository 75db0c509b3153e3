use crate::cycle::CycleOutcome;
use crate::detector::AccidentEvent;
use crate::error::{MonitorError, MonitorResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Monitor lifecycle as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    /// Not started, or host in background; no samples are fed
    Stopped,
    /// Sampling, waiting for an impact
    Armed,
    /// Accident detected, looking up the position
    Resolving,
    /// Position known, sending alerts
    Dispatching,
}

/// Progress of the single in-flight accident cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Idle,
    Resolving,
    Dispatching,
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub started: bool,
    pub sampling: bool,
    pub phase: CyclePhase,
    pub samples_received: u64,
    pub samples_dropped: u64,
    pub accidents_detected: u32,
    pub alerts_dispatched: u32,
    pub messages_sent: u32,
    pub messages_failed: u32,
    pub cycles_failed: u32,
    pub peak_magnitude: f64,
    pub last_event: Option<AccidentEvent>,
    pub last_outcome: Option<String>,
}

impl SessionMetadata {
    pub fn state(&self) -> MonitorState {
        if !self.sampling {
            return MonitorState::Stopped;
        }
        match self.phase {
            CyclePhase::Idle => MonitorState::Armed,
            CyclePhase::Resolving => MonitorState::Resolving,
            CyclePhase::Dispatching => MonitorState::Dispatching,
        }
    }

    pub fn cycle_in_flight(&self) -> bool {
        self.phase != CyclePhase::Idle
    }
}

/// Shared monitor session. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    metadata: Arc<Mutex<SessionMetadata>>,
}

impl MonitorSession {
    /// Create new session in Stopped state
    pub fn new() -> Self {
        let metadata = SessionMetadata {
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
            start_time: Utc::now().to_rfc3339(),
            started: false,
            sampling: false,
            phase: CyclePhase::Idle,
            samples_received: 0,
            samples_dropped: 0,
            accidents_detected: 0,
            alerts_dispatched: 0,
            messages_sent: 0,
            messages_failed: 0,
            cycles_failed: 0,
            peak_magnitude: 0.0,
            last_event: None,
            last_outcome: None,
        };

        MonitorSession {
            metadata: Arc::new(Mutex::new(metadata)),
        }
    }

    fn lock(&self) -> MonitorResult<MutexGuard<'_, SessionMetadata>> {
        self.metadata.lock().map_err(|_| {
            MonitorError::Internal("Failed to acquire session lock".to_string())
        })
    }

    /// Explicit start from the user (Stopped → Armed)
    pub fn start_monitoring(&self) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        if meta.started && meta.sampling {
            return Err(MonitorError::AlreadyRunning);
        }
        meta.started = true;
        meta.sampling = true;
        Ok(())
    }

    /// Host left the foreground. Returns true if sampling was on.
    pub fn enter_background(&self) -> MonitorResult<bool> {
        let mut meta = self.lock()?;
        let was_sampling = meta.sampling;
        meta.sampling = false;
        Ok(was_sampling)
    }

    /// Host returned to the foreground. Sampling only resumes once the user
    /// has started monitoring. Returns true if sampling was switched on.
    pub fn enter_foreground(&self) -> MonitorResult<bool> {
        let mut meta = self.lock()?;
        if !meta.started || meta.sampling {
            return Ok(false);
        }
        meta.sampling = true;
        Ok(true)
    }

    /// Final shutdown; monitoring must be started again explicitly
    pub fn stop_monitoring(&self) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        if !meta.started {
            return Err(MonitorError::NotRunning);
        }
        meta.started = false;
        meta.sampling = false;
        Ok(())
    }

    pub fn record_sample(&self, magnitude: f64, dropped: bool) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        meta.samples_received += 1;
        if dropped {
            meta.samples_dropped += 1;
        }
        if magnitude > meta.peak_magnitude {
            meta.peak_magnitude = magnitude;
        }
        Ok(())
    }

    /// Armed → Resolving
    pub fn begin_resolving(&self, event: &AccidentEvent) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        if meta.phase != CyclePhase::Idle {
            return Err(MonitorError::InvalidState(format!(
                "Accident cycle already {:?}",
                meta.phase
            )));
        }
        meta.phase = CyclePhase::Resolving;
        meta.accidents_detected += 1;
        meta.last_event = Some(event.clone());
        Ok(())
    }

    /// Resolving → Dispatching
    pub fn begin_dispatching(&self) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        if meta.phase != CyclePhase::Resolving {
            return Err(MonitorError::InvalidState(format!(
                "Cannot dispatch from {:?}",
                meta.phase
            )));
        }
        meta.phase = CyclePhase::Dispatching;
        Ok(())
    }

    /// Resolving/Dispatching → Idle, tallying the outcome
    pub fn finish_cycle(&self, outcome: &CycleOutcome) -> MonitorResult<()> {
        let mut meta = self.lock()?;
        if meta.phase == CyclePhase::Idle {
            return Err(MonitorError::InvalidState(
                "No accident cycle in flight".to_string(),
            ));
        }
        meta.phase = CyclePhase::Idle;
        meta.last_outcome = Some(outcome.summary());

        match outcome {
            CycleOutcome::Dispatched(report) => {
                meta.alerts_dispatched += 1;
                meta.messages_sent += report.sent() as u32;
                meta.messages_failed += report.failed() as u32;
            }
            CycleOutcome::LocationFailed(_) | CycleOutcome::Skipped(_) => {
                meta.cycles_failed += 1;
            }
        }
        Ok(())
    }

    pub fn get_state(&self) -> MonitorResult<MonitorState> {
        Ok(self.lock()?.state())
    }

    pub fn is_sampling(&self) -> MonitorResult<bool> {
        Ok(self.lock()?.sampling)
    }

    /// Get metadata snapshot
    pub fn get_metadata(&self) -> MonitorResult<SessionMetadata> {
        Ok(self.lock()?.clone())
    }
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self::new()
    }
}
