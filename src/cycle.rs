use crate::alert::{AlertDispatcher, DispatchReport};
use crate::contacts::ContactStore;
use crate::detector::AccidentEvent;
use crate::error::LocationError;
use crate::location::LocationResolver;
use crate::notify::{Notice, Notifier};
use crate::permissions::{Capability, Permissions};
use crate::session::MonitorSession;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LocationPermission,
    SmsPermission,
    NoContacts,
}

/// How one accident cycle ended. The detector re-arms after every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Dispatched(DispatchReport),
    LocationFailed(LocationError),
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// One-line description for status output
    pub fn summary(&self) -> String {
        match self {
            CycleOutcome::Dispatched(report) => format!(
                "alert sent to {} of {} contact(s)",
                report.sent(),
                report.attempted()
            ),
            CycleOutcome::LocationFailed(e) => format!("no alert: {}", e),
            CycleOutcome::Skipped(SkipReason::LocationPermission) => {
                "no alert: location permission denied".to_string()
            }
            CycleOutcome::Skipped(SkipReason::SmsPermission) => {
                "no alert: SMS permission denied".to_string()
            }
            CycleOutcome::Skipped(SkipReason::NoContacts) => {
                "no alert: no contacts saved".to_string()
            }
        }
    }
}

/// Location lookup followed by dispatch, for a single accident event.
///
/// Holds only shared handles so the cycle can run detached from the
/// controller while samples keep arriving.
#[derive(Clone)]
pub struct AlertCycle {
    resolver: Arc<LocationResolver>,
    dispatcher: Arc<AlertDispatcher>,
    contacts: ContactStore,
    permissions: Permissions,
    session: MonitorSession,
    notifier: Arc<dyn Notifier>,
}

impl AlertCycle {
    pub fn new(
        resolver: Arc<LocationResolver>,
        dispatcher: Arc<AlertDispatcher>,
        contacts: ContactStore,
        permissions: Permissions,
        session: MonitorSession,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            contacts,
            permissions,
            session,
            notifier,
        }
    }

    pub async fn run(&self, event: AccidentEvent) -> CycleOutcome {
        log::warn!(
            "Accident detected at {} ({:.1} m/s²)",
            event.detected_at.to_rfc3339(),
            event.magnitude
        );

        if self.permissions.is_denied(Capability::Location) {
            self.notifier.notify(Notice::LocationPermissionMissing);
            return CycleOutcome::Skipped(SkipReason::LocationPermission);
        }
        if self.permissions.is_denied(Capability::Sms) {
            self.notifier.notify(Notice::SmsPermissionMissing);
            return CycleOutcome::Skipped(SkipReason::SmsPermission);
        }

        let fix = match self.resolver.resolve().await {
            Ok(fix) => fix,
            Err(e) => {
                log::error!("No position for accident alert: {}", e);
                self.notifier.notify(Notice::LocationFailed(e.clone()));
                return CycleOutcome::LocationFailed(e);
            }
        };

        if let Err(e) = self.session.begin_dispatching() {
            log::warn!("Session out of step: {}", e);
        }

        // read at dispatch time so a save during resolution is honoured
        let contacts = self.contacts.current();
        if contacts.is_empty() {
            self.notifier.notify(Notice::NoContacts);
            return CycleOutcome::Skipped(SkipReason::NoContacts);
        }

        let report = self.dispatcher.dispatch(&fix.position, &contacts).await;
        CycleOutcome::Dispatched(report)
    }
}
