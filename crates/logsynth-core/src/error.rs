use std::io;

/// Invalid construction parameters for a sampler or generator.
///
/// Raised once, at construction. Nothing that failed to build can be sampled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("skew must lie in [0, 1], got {0}")]
    InvalidSkew(f64),

    #[error("{0} universe must contain at least one key")]
    EmptyUniverse(&'static str),

    #[error("{name} universe of {size} keys exceeds the maximum of {max}")]
    UniverseTooLarge {
        name: &'static str,
        size: u64,
        max: u64,
    },

    #[error("operation vocabulary is empty")]
    EmptyVocabulary,

    #[error("invalid operation token {0:?}: must be non-empty and contain no whitespace")]
    InvalidOperation(String),

    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("invalid time model: {0}")]
    InvalidTimeModel(String),

    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
}

/// Failure while reading an event line.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The line was read but is not a well-formed event.
    #[error("invalid event format ({reason}): {line:?}")]
    Format { line: String, reason: String },

    /// The underlying stream failed, independent of its content.
    #[error("failed to read event stream: {0}")]
    Io(#[from] io::Error),
}

impl EventError {
    pub(crate) fn format(line: &str, reason: impl Into<String>) -> Self {
        EventError::Format {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, EventError::Format { .. })
    }
}
