/// Result alias that carries the custom [`MeterError`] type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    /// Free-form failure that does not warrant its own variant.
    #[error("{0}")]
    Message(String),
    /// The capture source failed in a way the caller has to see.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// A configuration value is out of range.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration files are JSON documents.
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeterError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MeterError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MeterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Errors reported by a [`SampleSource`](crate::capture::SampleSource).
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,

    #[error("input device `{0}` not found")]
    DeviceNotFound(String),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to open capture source: {0}")]
    Open(String),

    #[error("capture source used before it was opened")]
    NotOpen,

    #[error("read failed: {0}")]
    Read(String),

    #[error("read timed out")]
    Timeout,

    #[error("capture stream disconnected")]
    Disconnected,

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

impl CaptureError {
    /// Whether a failed read is expected to clear up on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Timeout | Self::Wav(_))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_failures_are_transient() {
        assert!(CaptureError::Timeout.is_transient());
        assert!(CaptureError::Read("short read".into()).is_transient());
        assert!(!CaptureError::NoDevice.is_transient());
        assert!(!CaptureError::Disconnected.is_transient());
    }

    #[test]
    fn config_errors_name_the_field() {
        let err: MeterError = ConfigError::invalid("audio.sample_rate", "must be positive").into();
        let text = err.to_string();
        assert!(text.contains("audio.sample_rate"));
        assert!(text.contains("must be positive"));
    }
}
