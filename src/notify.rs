//! User-visible status notifications.
//!
//! A missed alert always produces a notice.

use crate::error::LocationError;
use crate::permissions::Capability;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    MonitoringStarted,
    SensorUnavailable(String),
    PermissionGranted(Capability),
    PermissionDenied(Capability),
    /// Accident detected but location access is not granted
    LocationPermissionMissing,
    /// Accident detected but SMS access is not granted
    SmsPermissionMissing,
    /// Cached position missing, falling back to an active request
    LocationRetrying,
    LocationFailed(LocationError),
    NoContacts,
    AlertSent { attempted: usize, failed: usize },
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Notice::MonitoringStarted => write!(f, "Accident monitoring started."),
            Notice::SensorUnavailable(msg) => write!(f, "Accelerometer unavailable: {}", msg),
            Notice::PermissionGranted(cap) => write!(f, "{} Permission Granted", cap),
            Notice::PermissionDenied(cap) => write!(f, "{} Permission Denied", cap),
            Notice::LocationPermissionMissing => write!(f, "Location permission is not granted"),
            Notice::SmsPermissionMissing => {
                write!(f, "SMS permission is not granted. Accident alert not sent.")
            }
            Notice::LocationRetrying => write!(f, "Failed to retrieve location. Trying again..."),
            Notice::LocationFailed(LocationError::Unavailable) => {
                write!(f, "Still unable to retrieve location.")
            }
            Notice::LocationFailed(LocationError::ProviderFailure(msg)) => {
                write!(f, "Failed to retrieve location. Error: {}", msg)
            }
            Notice::NoContacts => {
                write!(f, "No emergency contacts saved. Accident alert not sent.")
            }
            Notice::AlertSent { failed: 0, .. } => write!(f, "Accident alert sent!"),
            Notice::AlertSent { attempted, failed } => write!(
                f,
                "Accident alert sent! ({} of {} contact(s) failed)",
                failed, attempted
            ),
        }
    }
}

/// Sink for user-visible notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::LocationFailed(_)
            | Notice::NoContacts
            | Notice::SensorUnavailable(_)
            | Notice::PermissionDenied(_)
            | Notice::LocationPermissionMissing
            | Notice::SmsPermissionMissing => log::warn!("{}", notice),
            _ => log::info!("{}", notice),
        }
    }
}

/// Forwards notices to a channel, e.g. a UI thread or a console printer
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            log::debug!("Notice receiver dropped");
        }
    }
}
