use crate::detector::DetectionState;
use crate::session::{MonitorState, SessionMetadata};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Point-in-time view of the monitor, written as JSON for dashboards and
/// post-mortems. Never read back by the monitor itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorStatus {
    pub timestamp: f64,
    pub state: MonitorState,
    pub detection: DetectionState,
    pub threshold: f64,
    pub contacts_saved: usize,
    pub last_magnitude: Option<f64>,
    #[serde(flatten)]
    pub session: SessionMetadata,
}

impl MonitorStatus {
    pub fn new(
        session: SessionMetadata,
        detection: DetectionState,
        threshold: f64,
        contacts_saved: usize,
        last_magnitude: Option<f64>,
    ) -> Self {
        Self {
            timestamp: current_timestamp(),
            state: session.state(),
            detection,
            threshold,
            contacts_saved,
            last_magnitude,
            session,
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MonitorSession;

    #[test]
    fn test_status_serializes_flat() {
        let session = MonitorSession::new();
        session.start_monitoring().unwrap();
        session.record_sample(9.81, false).unwrap();

        let status = MonitorStatus::new(
            session.get_metadata().unwrap(),
            DetectionState::Armed,
            20.0,
            1,
            Some(9.81),
        );
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["state"], "Armed");
        assert_eq!(json["detection"], "Armed");
        assert_eq!(json["samples_received"], 1);
        assert_eq!(json["contacts_saved"], 1);
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir().join(format!(
            "accident_status_{}.json",
            std::process::id()
        ));
        let status = MonitorStatus::new(
            MonitorSession::new().get_metadata().unwrap(),
            DetectionState::Triggered,
            20.0,
            0,
            None,
        );
        status.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"detection\": \"Triggered\""));
        let _ = fs::remove_file(&path);
    }
}
