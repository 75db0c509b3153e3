use thiserror::Error;

/// Monitor lifecycle and configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    #[error("Monitoring already running")]
    AlreadyRunning,

    #[error("Monitoring not running")]
    NotRunning,

    #[error("Invalid monitor state: {0}")]
    InvalidState(String),

    #[error("Sensor failed: {0}")]
    SensorFailed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Terminal failure of a position lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Neither the cached position nor the active request produced a fix
    #[error("Location unavailable")]
    Unavailable,

    #[error("Location provider failed: {0}")]
    ProviderFailure(String),
}

/// Failure reported by a location collaborator
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Location command failed: {0}")]
    Command(String),

    #[error("Malformed location payload: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for LocationError {
    fn from(err: ProviderError) -> Self {
        LocationError::ProviderFailure(err.to_string())
    }
}

/// Per-contact send failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    /// The messaging backend refused the message
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// The message never reached the backend
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure to subscribe to or read the accelerometer
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Accelerometer unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed sensor payload: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SensorError> for MonitorError {
    fn from(err: SensorError) -> Self {
        MonitorError::SensorFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_becomes_provider_failure() {
        let err: LocationError = ProviderError::Command("exit status 1".to_string()).into();
        assert_eq!(
            err,
            LocationError::ProviderFailure("Location command failed: exit status 1".to_string())
        );
    }

    #[test]
    fn test_sensor_error_becomes_sensor_failed() {
        let err: MonitorError = SensorError::Unavailable("no accelerometer".to_string()).into();
        assert!(matches!(err, MonitorError::SensorFailed(msg) if msg.contains("no accelerometer")));
    }
}
