//! Scripted collaborators shared by the unit and integration tests.

use crate::alert::Messenger;
use crate::error::{ProviderError, SendError, SensorError};
use crate::location::{GeoPosition, LocationProvider, LocationRequest, SingleUpdateHandler};
use crate::notify::{Notice, Notifier};
use crate::sensors::{AccelSample, SensorFeed};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scripted answer of the cached-position lookup
#[derive(Debug, Clone)]
pub enum Lookup {
    Position(GeoPosition),
    Empty,
    Fail(String),
    /// Never return from the lookup call
    Stall,
}

/// Scripted behaviour of the active request
#[derive(Debug, Clone)]
pub enum Fresh {
    Position(GeoPosition),
    Empty,
    Fail(String),
    /// Drop the handler without completing
    Drop,
    /// Keep the handler and never complete
    Hang,
    /// Never return from the request call itself
    Stall,
}

pub struct FakeLocation {
    lookup: Lookup,
    fresh: Fresh,
    last_known_calls: AtomicUsize,
    fresh_calls: AtomicUsize,
    requests: Mutex<Vec<LocationRequest>>,
    held: Mutex<Vec<SingleUpdateHandler>>,
}

impl FakeLocation {
    pub fn new(lookup: Lookup, fresh: Fresh) -> Self {
        Self {
            lookup,
            fresh,
            last_known_calls: AtomicUsize::new(0),
            fresh_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn last_known_calls(&self) -> usize {
        self.last_known_calls.load(Ordering::SeqCst)
    }

    pub fn fresh_calls(&self) -> usize {
        self.fresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LocationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn last_known_position(&self) -> Result<Option<GeoPosition>, ProviderError> {
        self.last_known_calls.fetch_add(1, Ordering::SeqCst);
        match &self.lookup {
            Lookup::Position(p) => Ok(Some(*p)),
            Lookup::Empty => Ok(None),
            Lookup::Fail(msg) => Err(ProviderError::Command(msg.clone())),
            Lookup::Stall => std::future::pending().await,
        }
    }

    async fn request_single_update(
        &self,
        request: &LocationRequest,
        handler: SingleUpdateHandler,
    ) -> Result<(), ProviderError> {
        self.fresh_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.fresh {
            Fresh::Position(p) => {
                let p = *p;
                // complete from a separate task, like a platform callback
                tokio::spawn(async move { handler.on_complete(Some(p)) });
            }
            Fresh::Empty => handler.on_complete(None),
            Fresh::Fail(msg) => return Err(ProviderError::Command(msg.clone())),
            Fresh::Drop => drop(handler),
            Fresh::Hang => self.held.lock().unwrap().push(handler),
            Fresh::Stall => {
                let _handler = handler;
                std::future::pending::<()>().await;
            }
        }
        Ok(())
    }
}

/// Records every send; destinations in `failing` are rejected
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    failing: HashSet<String>,
}

impl RecordingMessenger {
    pub fn failing_for(destinations: &[&str]) -> Self {
        Self {
            failing: destinations.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Successful sends as (destination, body)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(destination) {
            return Err(SendError::Rejected(format!("{} unreachable", destination)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Feed whose samples are pushed by the test through `sender()`
#[derive(Clone, Default)]
pub struct ManualFeed {
    tx: Arc<Mutex<Option<mpsc::Sender<AccelSample>>>>,
    subscriptions: Arc<AtomicUsize>,
    available: Arc<Mutex<bool>>,
}

impl ManualFeed {
    pub fn new() -> Self {
        let feed = Self::default();
        *feed.available.lock().unwrap() = true;
        feed
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Sender of the current subscription, if any
    pub fn sender(&self) -> Option<mpsc::Sender<AccelSample>> {
        self.tx.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.tx.lock().unwrap().is_some()
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl SensorFeed for ManualFeed {
    fn name(&self) -> &str {
        "manual"
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<AccelSample>, SensorError> {
        if !*self.available.lock().unwrap() {
            return Err(SensorError::Unavailable("no accelerometer".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.tx.lock().unwrap() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.tx.lock().unwrap().take();
    }
}

pub fn still(timestamp: f64) -> AccelSample {
    AccelSample::new(0.0, 0.0, 9.81, timestamp)
}

pub fn impact(timestamp: f64) -> AccelSample {
    AccelSample::new(18.0, 12.0, 9.81, timestamp)
}
