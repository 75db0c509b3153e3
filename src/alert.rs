//! Alert message composition and per-contact delivery.

use crate::contacts::ContactSet;
use crate::error::SendError;
use crate::location::GeoPosition;
use crate::notify::{Notice, Notifier};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAPS_URL: &str = "https://maps.google.com/?q=";

/// Text sent unchanged to every contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    body: String,
}

impl AlertMessage {
    pub fn for_position(position: &GeoPosition) -> Self {
        let body = format!(
            "Accident detected!\nLocation: {}{}%2C{}",
            MAPS_URL,
            decimal(position.latitude),
            decimal(position.longitude)
        );
        Self { body }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Plain decimal text; whole numbers keep a trailing ".0"
fn decimal(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Messaging collaborator. Fire-and-forget: `Ok` means the backend accepted
/// the message, not that it was delivered.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SendError>;
}

/// Logs messages instead of sending them
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SendError> {
        log::info!("[dry-run] SMS to {}: {}", destination, body.replace('\n', " | "));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactOutcome {
    pub destination: String,
    pub result: Result<(), SendError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub message: AlertMessage,
    pub outcomes: Vec<ContactOutcome>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.sent()
    }
}

pub struct AlertDispatcher {
    messenger: Arc<dyn Messenger>,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            messenger,
            notifier,
        }
    }

    /// Send one alert to each contact.
    ///
    /// Sends run concurrently and independently; one contact's failure never
    /// cancels another's. The confirmation notice goes out once every send
    /// has been attempted.
    pub async fn dispatch(&self, position: &GeoPosition, contacts: &ContactSet) -> DispatchReport {
        let message = AlertMessage::for_position(position);

        let messenger = self.messenger.as_ref();
        let body = message.body();
        let sends = contacts.iter().map(move |destination| async move {
            let result = messenger.send_text(destination, body).await;
            match &result {
                Ok(()) => log::info!("Sent to {} via {}", destination, messenger.name()),
                Err(e) => log::warn!("Send to {} failed: {}", destination, e),
            }
            ContactOutcome {
                destination: destination.to_string(),
                result,
            }
        });
        let outcomes = join_all(sends).await;

        let report = DispatchReport { message, outcomes };
        self.notifier.notify(Notice::AlertSent {
            attempted: report.attempted(),
            failed: report.failed(),
        });
        report
    }
}
