//! Monitor lifecycle and wiring.
//!
//! The controller owns the detector and the sensor subscription. Accident
//! cycles run detached (see [`AlertCycle`]) so samples keep draining while a
//! position is looked up; those samples hit a triggered detector and are
//! dropped. The detector re-arms only when the cycle future completes.

use crate::alert::{AlertDispatcher, Messenger};
use crate::config::MonitorConfig;
use crate::contacts::ContactStore;
use crate::cycle::{AlertCycle, CycleOutcome};
use crate::detector::{AccidentEvent, DetectionState, Detector};
use crate::error::MonitorResult;
use crate::location::{LocationProvider, LocationResolver};
use crate::notify::{Notice, Notifier};
use crate::permissions::{Capability, Permissions};
use crate::sensors::{AccelSample, MotionSampler, SensorFeed};
use crate::session::{MonitorSession, MonitorState, SessionMetadata};
use crate::status::MonitorStatus;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Requests from the host (UI actions and lifecycle hooks)
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Start,
    /// Host left the foreground
    Pause,
    /// Host returned to the foreground
    Resume,
    SaveContacts(Option<String>, Option<String>),
    Permission(Capability, bool),
    /// Stop once any in-flight cycle has finished
    Shutdown,
}

type CycleFuture = Pin<Box<dyn Future<Output = CycleOutcome> + Send>>;

pub struct MonitoringController {
    session: MonitorSession,
    sampler: MotionSampler,
    detector: Detector,
    feed: Box<dyn SensorFeed>,
    samples: Option<mpsc::Receiver<AccelSample>>,
    cycle: AlertCycle,
    contacts: ContactStore,
    permissions: Permissions,
    notifier: Arc<dyn Notifier>,
    status_path: Option<PathBuf>,
    exit_when_feed_ends: bool,
}

impl MonitoringController {
    pub fn new(
        config: &MonitorConfig,
        feed: Box<dyn SensorFeed>,
        location: Arc<dyn LocationProvider>,
        messenger: Arc<dyn Messenger>,
        notifier: Arc<dyn Notifier>,
    ) -> MonitorResult<Self> {
        Self::with_parts(
            config,
            feed,
            location,
            messenger,
            notifier,
            ContactStore::new(),
            Permissions::new(),
        )
    }

    /// Build around contact and permission handles the host already holds
    pub fn with_parts(
        config: &MonitorConfig,
        feed: Box<dyn SensorFeed>,
        location: Arc<dyn LocationProvider>,
        messenger: Arc<dyn Messenger>,
        notifier: Arc<dyn Notifier>,
        contacts: ContactStore,
        permissions: Permissions,
    ) -> MonitorResult<Self> {
        config.validate()?;

        let session = MonitorSession::new();
        let resolver = LocationResolver::from_config(location, notifier.clone(), config);
        let dispatcher = AlertDispatcher::new(messenger, notifier.clone());
        let cycle = AlertCycle::new(
            Arc::new(resolver),
            Arc::new(dispatcher),
            contacts.clone(),
            permissions.clone(),
            session.clone(),
            notifier.clone(),
        );

        Ok(Self {
            session,
            sampler: MotionSampler::new(),
            detector: Detector::new(config.threshold),
            feed,
            samples: None,
            cycle,
            contacts,
            permissions,
            notifier,
            status_path: None,
            exit_when_feed_ends: false,
        })
    }

    /// Write a status snapshot after every cycle and on exit
    pub fn with_status_file(mut self, path: PathBuf) -> Self {
        self.status_path = Some(path);
        self
    }

    /// Make `run` return once a finite feed (e.g. a replay) is exhausted
    pub fn exit_when_feed_ends(mut self, exit: bool) -> Self {
        self.exit_when_feed_ends = exit;
        self
    }

    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub fn detection_state(&self) -> DetectionState {
        self.detector.state()
    }

    pub fn state(&self) -> MonitorResult<MonitorState> {
        self.session.get_state()
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.detector.set_threshold(threshold);
    }

    /// Explicit "start monitoring" from the user
    pub fn start(&mut self) -> MonitorResult<()> {
        self.session.start_monitoring()?;
        if let Err(e) = self.subscribe() {
            let _ = self.session.stop_monitoring();
            return Err(e);
        }
        log::info!("Accident monitoring started.");
        self.notifier.notify(Notice::MonitoringStarted);
        Ok(())
    }

    /// Host left the foreground: stop feeding samples. An in-flight cycle
    /// keeps running; the detector state is untouched.
    pub fn pause(&mut self) -> MonitorResult<()> {
        if self.session.enter_background()? {
            self.feed.unsubscribe();
            self.samples = None;
            log::info!("Sampling suspended");
        }
        Ok(())
    }

    /// Host returned to the foreground
    pub fn resume(&mut self) -> MonitorResult<()> {
        if self.session.enter_foreground()? {
            if let Err(e) = self.subscribe() {
                let _ = self.session.enter_background();
                return Err(e);
            }
            log::info!("Sampling resumed");
        }
        Ok(())
    }

    fn subscribe(&mut self) -> MonitorResult<()> {
        match self.feed.subscribe() {
            Ok(rx) => {
                log::debug!("Subscribed to {} feed", self.feed.name());
                self.samples = Some(rx);
                Ok(())
            }
            Err(e) => {
                log::error!("Cannot subscribe to {} feed: {}", self.feed.name(), e);
                self.notifier.notify(Notice::SensorUnavailable(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Feed one sample through sampler and detector. Returns the accident
    /// event if this sample triggered one; the session is then Resolving.
    pub fn on_sample(&mut self, sample: AccelSample) -> Option<AccidentEvent> {
        match self.session.is_sampling() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                log::error!("{}", e);
                return None;
            }
        }

        let magnitude = self.sampler.on_sample(&sample);
        let in_flight = self.detector.state() == DetectionState::Triggered;
        let event = self.detector.evaluate(magnitude);

        if let Err(e) = self.session.record_sample(magnitude, in_flight) {
            log::error!("{}", e);
        }
        if let Some(event) = &event {
            if let Err(e) = self.session.begin_resolving(event) {
                log::error!("{}", e);
            }
        }
        event
    }

    /// The feed stopped delivering while sampling. Nothing can be detected any
    /// more, so monitoring stops and the user is told; a new `Start` resubscribes.
    fn on_feed_lost(&mut self) {
        log::error!("{} feed stopped delivering samples", self.feed.name());
        self.feed.unsubscribe();
        if let Err(e) = self.session.stop_monitoring() {
            log::debug!("{}", e);
        }
        self.notifier.notify(Notice::SensorUnavailable(format!(
            "{} feed stopped",
            self.feed.name()
        )));
        self.write_status();
    }

    /// Detached handle that runs one accident cycle
    pub fn cycle(&self) -> AlertCycle {
        self.cycle.clone()
    }

    /// Close out a cycle: re-arm the detector whatever the outcome
    pub fn complete_cycle(&mut self, outcome: &CycleOutcome) {
        self.detector.rearm();
        if let Err(e) = self.session.finish_cycle(outcome) {
            log::error!("{}", e);
        }
        log::info!("Cycle finished ({}), detector re-armed", outcome.summary());
        self.write_status();
    }

    /// Run a cycle inline and complete it
    pub async fn handle_accident(&mut self, event: AccidentEvent) -> CycleOutcome {
        let outcome = self.cycle.run(event).await;
        self.complete_cycle(&outcome);
        outcome
    }

    /// Apply one host command. Returns false on `Shutdown`.
    pub fn apply(&mut self, command: ControlCommand) -> bool {
        let result = match command {
            ControlCommand::Start => self.start(),
            ControlCommand::Pause => self.pause(),
            ControlCommand::Resume => self.resume(),
            ControlCommand::SaveContacts(first, second) => {
                self.contacts.save(first, second);
                Ok(())
            }
            ControlCommand::Permission(capability, granted) => {
                let notice = self.permissions.record(capability, granted);
                self.notifier.notify(notice);
                Ok(())
            }
            ControlCommand::Shutdown => return false,
        };
        if let Err(e) = result {
            log::warn!("Command failed: {}", e);
        }
        true
    }

    pub fn status(&self) -> MonitorResult<MonitorStatus> {
        Ok(MonitorStatus::new(
            self.session.get_metadata()?,
            self.detector.state(),
            self.detector.threshold(),
            self.contacts.current().len(),
            self.sampler.last_magnitude(),
        ))
    }

    fn write_status(&self) {
        let Some(path) = &self.status_path else {
            return;
        };
        match self.status() {
            Ok(status) => {
                if let Err(e) = status.save(path) {
                    log::warn!("Failed to write status to {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    /// Event loop: host commands, samples and the in-flight cycle, on one task.
    ///
    /// Returns after `Shutdown`, when the command channel closes, or (if
    /// configured) when the feed ends, always waiting for an in-flight cycle.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ControlCommand>,
    ) -> MonitorResult<SessionMetadata> {
        let mut in_flight: Option<CycleFuture> = None;
        let mut shutting_down = false;

        loop {
            if shutting_down && in_flight.is_none() {
                break;
            }

            tokio::select! {
                outcome = poll_cycle(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.complete_cycle(&outcome);
                }
                command = commands.recv(), if !shutting_down => {
                    match command {
                        Some(command) => {
                            if !self.apply(command) {
                                log::info!("Shutdown requested");
                                shutting_down = true;
                            }
                        }
                        None => {
                            log::info!("Host closed the command channel");
                            shutting_down = true;
                        }
                    }
                }
                sample = next_sample(&mut self.samples), if self.samples.is_some() && !shutting_down => {
                    match sample {
                        Some(sample) => {
                            if let Some(event) = self.on_sample(sample) {
                                let cycle = self.cycle.clone();
                                in_flight = Some(Box::pin(async move { cycle.run(event).await }));
                            }
                        }
                        None => {
                            self.samples = None;
                            if self.exit_when_feed_ends {
                                log::info!("{} feed ended", self.feed.name());
                                shutting_down = true;
                            } else {
                                self.on_feed_lost();
                            }
                        }
                    }
                }
            }
        }

        self.feed.unsubscribe();
        self.samples = None;
        if let Err(e) = self.session.stop_monitoring() {
            log::debug!("{}", e);
        }
        self.write_status();
        self.session.get_metadata()
    }
}

async fn poll_cycle(in_flight: &mut Option<CycleFuture>) -> CycleOutcome {
    match in_flight {
        Some(cycle) => cycle.await,
        None => std::future::pending().await,
    }
}

async fn next_sample(samples: &mut Option<mpsc::Receiver<AccelSample>>) -> Option<AccelSample> {
    match samples {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
