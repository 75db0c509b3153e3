//! Best-effort position lookup.
//!
//! Two phases: the platform's cached last-known position, then exactly one
//! active high-accuracy request if the cache is empty. There is no retry loop
//! beyond that single fallback.

use crate::config::MonitorConfig;
use crate::error::{LocationError, ProviderError};
use crate::notify::{Notice, Notifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPriority {
    HighAccuracy,
    BalancedPowerAccuracy,
    LowPower,
}

/// Parameters of the active fallback request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationRequest {
    pub interval_ms: u64,
    pub fastest_interval_ms: u64,
    pub priority: LocationPriority,
    pub num_updates: u32,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            fastest_interval_ms: 500,
            priority: LocationPriority::HighAccuracy,
            num_updates: 1,
        }
    }
}

/// Handling of an error (not an empty result) from the cached-position lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFailurePolicy {
    /// Treat the error like an empty cache and issue the active request
    #[default]
    Fallback,
    /// Fail the cycle with `ProviderFailure`, no active request
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSource {
    LastKnown,
    FreshFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub position: GeoPosition,
    pub source: PositionSource,
}

/// Completion handle for one active location request.
///
/// Consumed by `on_complete`, so a provider can report at most once. Dropping
/// it without completing counts as "no position".
#[derive(Debug)]
pub struct SingleUpdateHandler {
    tx: oneshot::Sender<Option<GeoPosition>>,
}

impl SingleUpdateHandler {
    pub fn channel() -> (Self, oneshot::Receiver<Option<GeoPosition>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn on_complete(self, position: Option<GeoPosition>) {
        if self.tx.send(position).is_err() {
            log::debug!("Location result arrived after the resolver gave up");
        }
    }
}

/// Location-services collaborator
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Cached position, without issuing a new fix
    async fn last_known_position(&self) -> Result<Option<GeoPosition>, ProviderError>;

    /// Start one active request. The provider must eventually call
    /// `handler.on_complete`, either before returning or later from its own
    /// callback context.
    async fn request_single_update(
        &self,
        request: &LocationRequest,
        handler: SingleUpdateHandler,
    ) -> Result<(), ProviderError>;
}

/// Position source that always answers with the same fix (dry runs, demos)
pub struct FixedLocation {
    position: Option<GeoPosition>,
}

impl FixedLocation {
    pub fn new(position: Option<GeoPosition>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn last_known_position(&self) -> Result<Option<GeoPosition>, ProviderError> {
        Ok(self.position)
    }

    async fn request_single_update(
        &self,
        _request: &LocationRequest,
        handler: SingleUpdateHandler,
    ) -> Result<(), ProviderError> {
        handler.on_complete(self.position);
        Ok(())
    }
}

pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    notifier: Arc<dyn Notifier>,
    request: LocationRequest,
    policy: ProviderFailurePolicy,
    fix_timeout: Option<Duration>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self::from_config(provider, notifier, &MonitorConfig::default())
    }

    pub fn from_config(
        provider: Arc<dyn LocationProvider>,
        notifier: Arc<dyn Notifier>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            provider,
            notifier,
            request: config.location.clone(),
            policy: config.provider_failure,
            fix_timeout: config.fix_timeout(),
        }
    }

    pub fn with_policy(mut self, policy: ProviderFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fix_timeout(mut self, fix_timeout: Option<Duration>) -> Self {
        self.fix_timeout = fix_timeout;
        self
    }

    pub async fn resolve(&self) -> Result<PositionFix, LocationError> {
        let lookup = match self.fix_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.provider.last_known_position()).await {
                Ok(lookup) => lookup,
                Err(_) => {
                    log::warn!("Last known position lookup stalled for {:.1}s", limit.as_secs_f64());
                    Ok(None)
                }
            },
            None => self.provider.last_known_position().await,
        };

        match lookup {
            Ok(Some(position)) => {
                log::info!(
                    "Using last known position {:.6}, {:.6}",
                    position.latitude,
                    position.longitude
                );
                return Ok(PositionFix {
                    position,
                    source: PositionSource::LastKnown,
                });
            }
            Ok(None) => log::info!("No last known position"),
            Err(e) => {
                log::error!("Failed to get last known location: {}", e);
                if self.policy == ProviderFailurePolicy::Abort {
                    return Err(e.into());
                }
            }
        }

        self.notifier.notify(Notice::LocationRetrying);
        let position = self.request_fresh_fix().await?;
        log::info!(
            "Fresh fix {:.6}, {:.6}",
            position.latitude,
            position.longitude
        );
        Ok(PositionFix {
            position,
            source: PositionSource::FreshFix,
        })
    }

    /// One active request. The deadline covers the provider call as well as
    /// the handler completion; some providers only return once they have a fix.
    async fn request_fresh_fix(&self) -> Result<GeoPosition, LocationError> {
        let (handler, completion) = SingleUpdateHandler::channel();
        let fix = async {
            self.provider
                .request_single_update(&self.request, handler)
                .await?;
            Ok::<_, LocationError>(completion.await)
        };

        let outcome = match self.fix_timeout {
            Some(limit) => match tokio::time::timeout(limit, fix).await {
                Ok(outcome) => outcome?,
                Err(_) => {
                    log::warn!("No fix within {:.1}s", limit.as_secs_f64());
                    return Err(LocationError::Unavailable);
                }
            },
            None => fix.await?,
        };

        match outcome {
            Ok(Some(position)) => Ok(position),
            Ok(None) => Err(LocationError::Unavailable),
            Err(_) => {
                log::warn!("Location request ended without a result");
                Err(LocationError::Unavailable)
            }
        }
    }
}
