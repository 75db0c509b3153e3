//! Sensor feed backed by a recorded session log.
//!
//! Log format: `{"readings": [{"timestamp": .., "accel": {..}}, ..]}`, plain or
//! `.gz`. Readings without an `accel` entry are skipped.

use crate::error::SensorError;
use crate::sensors::{AccelSample, SensorFeed};
use anyhow::Context;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Longest pause honoured between two readings when pacing
const MAX_GAP: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct Reading {
    timestamp: f64,
    accel: Option<AccelSample>,
}

#[derive(Deserialize)]
struct LogFile {
    readings: Vec<Reading>,
}

/// Load the accelerometer samples of a session log
pub fn load_samples(path: &Path) -> anyhow::Result<Vec<AccelSample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let log: LogFile = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader::<_, LogFile>(BufReader::new(GzDecoder::new(file)))
    } else {
        serde_json::from_reader::<_, LogFile>(BufReader::new(file))
    }
    .with_context(|| format!("parsing {}", path.display()))?;

    Ok(log
        .readings
        .into_iter()
        .filter_map(|r| {
            r.accel.map(|mut a| {
                if a.timestamp == 0.0 {
                    a.timestamp = r.timestamp;
                }
                a
            })
        })
        .collect())
}

/// Replays a recorded log as a live feed.
///
/// The cursor counts readings the consumer has taken, so unsubscribing and
/// subscribing again resumes where delivery stopped. At most one reading is
/// delivered twice across such a pause.
pub struct ReplayFeed {
    samples: Arc<Vec<AccelSample>>,
    cursor: Arc<AtomicUsize>,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl ReplayFeed {
    pub fn from_samples(samples: Vec<AccelSample>, realtime: bool) -> Self {
        Self {
            samples: Arc::new(samples),
            cursor: Arc::new(AtomicUsize::new(0)),
            realtime,
            task: None,
        }
    }

    pub fn open(path: &Path, realtime: bool) -> anyhow::Result<Self> {
        let samples = load_samples(path)?;
        log::info!("Loaded {} accelerometer samples from {}", samples.len(), path.display());
        Ok(Self::from_samples(samples, realtime))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the next reading to be delivered
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl SensorFeed for ReplayFeed {
    fn name(&self) -> &str {
        "replay"
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<AccelSample>, SensorError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SensorError::Unavailable(e.to_string()))?;
        self.unsubscribe();

        let (tx, rx) = mpsc::channel(1);
        self.task = Some(runtime.spawn(replay_loop(
            self.samples.clone(),
            self.cursor.clone(),
            self.realtime,
            tx,
        )));
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ReplayFeed {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn replay_loop(
    samples: Arc<Vec<AccelSample>>,
    cursor: Arc<AtomicUsize>,
    realtime: bool,
    tx: mpsc::Sender<AccelSample>,
) {
    let start = cursor.load(Ordering::SeqCst);
    let mut previous: Option<f64> = None;

    for (index, sample) in samples.iter().enumerate().skip(start) {
        if realtime {
            if let Some(prev) = previous {
                let gap = (sample.timestamp - prev).max(0.0);
                tokio::time::sleep(Duration::from_secs_f64(gap).min(MAX_GAP)).await;
            }
            previous = Some(sample.timestamp);
        }

        if tx.send(*sample).await.is_err() {
            return;
        }
        // capacity is one: a free slot means the reading was taken
        if tx.reserve().await.is_err() {
            return;
        }
        cursor.store(index + 1, Ordering::SeqCst);
    }
    log::info!("[replay] End of log after {} samples", samples.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const LOG: &str = r#"{
  "readings": [
    {"timestamp": 100.0, "accel": {"timestamp": 100.0, "x": 0.1, "y": 0.2, "z": 9.8}},
    {"timestamp": 100.2, "gps": null},
    {"timestamp": 100.4, "accel": {"x": 18.0, "y": 12.0, "z": 9.81}}
  ]
}"#;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_load_plain_log() {
        let path = temp_path("replay_plain.json");
        std::fs::write(&path, LOG).unwrap();

        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], AccelSample::new(0.1, 0.2, 9.8, 100.0));
        // missing accel timestamp falls back to the reading's
        assert_eq!(samples[1].timestamp, 100.4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_gzip_log() {
        let path = temp_path("replay_gz.json.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(LOG.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[1].magnitude() > 20.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_bad_log() {
        let path = temp_path("replay_bad.json");
        std::fs::write(&path, "{\"readings\": 3}").unwrap();
        let err = load_samples(&path).unwrap_err();
        assert!(err.to_string().contains("parsing"));
        let _ = std::fs::remove_file(&path);

        assert!(load_samples(&temp_path("replay_missing.json")).is_err());
    }

    #[tokio::test]
    async fn test_feed_delivers_all_then_ends() {
        let samples: Vec<_> = (0..5)
            .map(|i| AccelSample::new(0.0, 0.0, 9.81, i as f64))
            .collect();
        let mut feed = ReplayFeed::from_samples(samples, false);

        let mut rx = feed.subscribe().unwrap();
        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample.timestamp);
        }
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(feed.position(), 5);

        // exhausted log stays exhausted after resubscribing
        let mut rx = feed.subscribe().unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pause_keeps_unconsumed_readings() {
        let samples: Vec<_> = (0..5)
            .map(|i| AccelSample::new(0.0, 0.0, 9.81, i as f64))
            .collect();
        let mut feed = ReplayFeed::from_samples(samples, false);

        let mut rx = feed.subscribe().unwrap();
        assert_eq!(rx.recv().await.unwrap().timestamp, 0.0);
        assert_eq!(rx.recv().await.unwrap().timestamp, 1.0);
        // let the loop queue ahead as far as it can
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.unsubscribe();
        drop(rx);
        assert_eq!(feed.position(), 2);

        let mut rx = feed.subscribe().unwrap();
        let mut rest = Vec::new();
        while let Some(sample) = rx.recv().await {
            rest.push(sample.timestamp);
        }
        assert_eq!(rest, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_resubscribe_resumes_at_cursor() {
        let samples: Vec<_> = (0..3)
            .map(|i| AccelSample::new(0.0, 0.0, 9.81, i as f64))
            .collect();
        let mut feed = ReplayFeed::from_samples(samples, false);
        feed.cursor.store(2, Ordering::SeqCst);

        let mut rx = feed.subscribe().unwrap();
        assert_eq!(rx.recv().await.unwrap().timestamp, 2.0);
        assert!(rx.recv().await.is_none());
    }
}
