// Accident Alert
// Impact detection on the accelerometer stream, position lookup and SMS
// alerts to emergency contacts.

pub mod alert;
pub mod config;
pub mod contacts;
pub mod controller;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod location;
pub mod notify;
pub mod permissions;
pub mod platform;
pub mod replay;
pub mod sensors;
pub mod session;
pub mod status;

#[cfg(test)]
mod test_support;

pub use alert::{AlertDispatcher, AlertMessage, DispatchReport, LogMessenger, Messenger};
pub use config::MonitorConfig;
pub use contacts::{ContactSet, ContactStore};
pub use controller::{ControlCommand, MonitoringController};
pub use cycle::{AlertCycle, CycleOutcome, SkipReason};
pub use detector::{AccidentEvent, DetectionState, Detector};
pub use error::{LocationError, MonitorError, MonitorResult, SendError, SensorError};
pub use location::{
    FixedLocation, GeoPosition, LocationProvider, LocationResolver, PositionFix,
    ProviderFailurePolicy,
};
pub use notify::{ChannelNotifier, LogNotifier, Notice, Notifier};
pub use permissions::{Capability, Permissions};
pub use sensors::{AccelSample, MotionSampler, SensorFeed};
pub use session::{MonitorSession, MonitorState, SessionMetadata};
pub use status::MonitorStatus;
