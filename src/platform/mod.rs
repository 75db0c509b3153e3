//! Adapters binding the monitor's collaborator traits to a device.
//!
//! - `termux`: accelerometer, location and SMS through the Termux:API commands
//! - `webhook`: SMS via an HTTP gateway

pub mod termux;
pub mod webhook;

pub use termux::{TermuxAccelerometer, TermuxLocation, TermuxSms};
pub use webhook::WebhookMessenger;
