use crate::notify::Notice;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

/// Runtime capabilities the alert cycle depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Location,
    Sms,
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Capability::Location => write!(f, "Location"),
            Capability::Sms => write!(f, "SMS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Host has not reported a result yet; the capability is attempted
    Unknown,
    Granted,
    Denied,
}

/// Permission outcomes reported by the host.
///
/// The core never requests permissions itself and never retries after a
/// denial; a denied capability stays off until the host records a new grant.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    inner: Arc<RwLock<HashMap<Capability, PermissionStatus>>>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// All capabilities granted up front (device shells without a permission model)
    pub fn all_granted() -> Self {
        let permissions = Self::new();
        permissions.set(Capability::Location, PermissionStatus::Granted);
        permissions.set(Capability::Sms, PermissionStatus::Granted);
        permissions
    }

    /// Record a permission result and return the notice to show the user
    pub fn record(&self, capability: Capability, granted: bool) -> Notice {
        if granted {
            self.set(capability, PermissionStatus::Granted);
            log::info!("{} permission granted", capability);
            Notice::PermissionGranted(capability)
        } else {
            self.set(capability, PermissionStatus::Denied);
            log::warn!("{} permission denied", capability);
            Notice::PermissionDenied(capability)
        }
    }

    pub fn status(&self, capability: Capability) -> PermissionStatus {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&capability)
            .copied()
            .unwrap_or(PermissionStatus::Unknown)
    }

    pub fn is_denied(&self, capability: Capability) -> bool {
        self.status(capability) == PermissionStatus::Denied
    }

    fn set(&self, capability: Capability, status: PermissionStatus) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_until_recorded() {
        let permissions = Permissions::new();
        assert_eq!(permissions.status(Capability::Location), PermissionStatus::Unknown);
        assert!(!permissions.is_denied(Capability::Location));
    }

    #[test]
    fn test_record_returns_notice() {
        let permissions = Permissions::new();
        let notice = permissions.record(Capability::Sms, false);
        assert_eq!(notice, Notice::PermissionDenied(Capability::Sms));
        assert!(permissions.is_denied(Capability::Sms));

        let notice = permissions.record(Capability::Sms, true);
        assert_eq!(notice, Notice::PermissionGranted(Capability::Sms));
        assert!(!permissions.is_denied(Capability::Sms));
    }

    #[test]
    fn test_all_granted() {
        let permissions = Permissions::all_granted();
        assert_eq!(permissions.status(Capability::Location), PermissionStatus::Granted);
        assert_eq!(permissions.status(Capability::Sms), PermissionStatus::Granted);
    }
}
