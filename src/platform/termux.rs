//! Termux:API adapters (`termux-sensor`, `termux-location`, `termux-sms-send`).
//!
//! Each call shells out to the Termux:API command and parses its JSON output.
//! Command names are overridable so the adapters can point at wrappers.

use crate::alert::Messenger;
use crate::error::{ProviderError, SendError, SensorError};
use crate::location::{
    GeoPosition, LocationPriority, LocationProvider, LocationRequest, SingleUpdateHandler,
};
use crate::sensors::{AccelSample, SensorFeed};
use crate::status::current_timestamp;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::interval;

#[derive(Deserialize)]
struct SensorValues {
    #[serde(default)]
    values: Vec<f64>,
}

/// Parse `termux-sensor -n 1` output:
/// `{"<sensor name>": {"values": [x, y, z]}}`
pub fn parse_sensor_output(output: &str, timestamp: f64) -> Result<AccelSample, SensorError> {
    let readings: BTreeMap<String, SensorValues> =
        serde_json::from_str(output.trim()).map_err(|e| SensorError::Parse(e.to_string()))?;

    readings
        .values()
        .find(|r| r.values.len() >= 3)
        .map(|r| AccelSample::new(r.values[0], r.values[1], r.values[2], timestamp))
        .ok_or_else(|| SensorError::Parse("no accelerometer values".to_string()))
}

/// Polls the accelerometer through `termux-sensor` at a fixed period
pub struct TermuxAccelerometer {
    command: String,
    period: Duration,
    buffer: usize,
    task: Option<JoinHandle<()>>,
}

impl TermuxAccelerometer {
    pub fn new(period: Duration, buffer: usize) -> Self {
        Self {
            command: "termux-sensor".to_string(),
            period,
            buffer,
            task: None,
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }
}

impl SensorFeed for TermuxAccelerometer {
    fn name(&self) -> &str {
        "termux-sensor"
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<AccelSample>, SensorError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SensorError::Unavailable(e.to_string()))?;
        self.unsubscribe();

        let (tx, rx) = mpsc::channel(self.buffer);
        self.task = Some(runtime.spawn(accel_loop(self.command.clone(), self.period, tx)));
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TermuxAccelerometer {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn accel_loop(command: String, period: Duration, tx: mpsc::Sender<AccelSample>) {
    let mut interval = interval(period);
    let mut sample_count = 0u64;

    loop {
        interval.tick().await;

        let sample = match read_accelerometer(&command).await {
            Ok(sample) => sample,
            Err(SensorError::Io(e)) => {
                log::error!("[accel] {} unusable: {}", command, e);
                break;
            }
            Err(e) => {
                log::debug!("[accel] read failed: {}", e);
                continue;
            }
        };

        match tx.try_send(sample) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 100 == 0 {
                    log::debug!("[accel] {} samples", sample_count);
                }
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("[accel] Channel closed after {} samples", sample_count);
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }
}

async fn read_accelerometer(command: &str) -> Result<AccelSample, SensorError> {
    let output = Command::new(command)
        .args(["-s", "accelerometer", "-n", "1"])
        .output()
        .await?;
    if !output.status.success() {
        return Err(SensorError::Unavailable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    parse_sensor_output(&String::from_utf8_lossy(&output.stdout), current_timestamp())
}

#[derive(Deserialize)]
struct TermuxFix {
    latitude: f64,
    longitude: f64,
}

/// Parse `termux-location` output. Empty output means no fix.
pub fn parse_location_output(output: &str) -> Result<Option<GeoPosition>, ProviderError> {
    let text = output.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProviderError::Parse(e.to_string()))?;
    if let Some(err) = value.get("API_ERROR") {
        return Err(ProviderError::Command(err.to_string()));
    }
    if value.get("latitude").is_none() {
        return Ok(None);
    }

    let fix: TermuxFix =
        serde_json::from_value(value).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(Some(GeoPosition::new(fix.latitude, fix.longitude)))
}

fn provider_for(priority: LocationPriority) -> &'static str {
    match priority {
        LocationPriority::HighAccuracy => "gps",
        LocationPriority::BalancedPowerAccuracy => "network",
        LocationPriority::LowPower => "passive",
    }
}

/// Location through `termux-location`.
///
/// `termux-location` has no interval settings; only the priority maps to a
/// provider. A one-shot request always yields exactly one update.
pub struct TermuxLocation {
    command: String,
}

impl TermuxLocation {
    pub fn new() -> Self {
        Self {
            command: "termux-location".to_string(),
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    async fn query(&self, provider: &str, request: &str) -> Result<Option<GeoPosition>, ProviderError> {
        let output = Command::new(&self.command)
            .args(["-p", provider, "-r", request])
            .output()
            .await?;
        if !output.status.success() {
            return Err(ProviderError::Command(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }
        parse_location_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Default for TermuxLocation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationProvider for TermuxLocation {
    async fn last_known_position(&self) -> Result<Option<GeoPosition>, ProviderError> {
        self.query("passive", "last").await
    }

    async fn request_single_update(
        &self,
        request: &LocationRequest,
        handler: SingleUpdateHandler,
    ) -> Result<(), ProviderError> {
        let position = self.query(provider_for(request.priority), "once").await?;
        handler.on_complete(position);
        Ok(())
    }
}

/// SMS through `termux-sms-send`
pub struct TermuxSms {
    command: String,
}

impl TermuxSms {
    pub fn new() -> Self {
        Self {
            command: "termux-sms-send".to_string(),
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }
}

impl Default for TermuxSms {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for TermuxSms {
    fn name(&self) -> &str {
        "termux-sms"
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SendError> {
        let output = Command::new(&self.command)
            .args(["-n", destination, body])
            .output()
            .await
            .map_err(|e| SendError::Transport(format!("{}: {}", self.command, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(SendError::Rejected(if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            }))
        }
    }
}
