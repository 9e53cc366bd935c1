//! Failure classification for remote capabilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a failed remote call may succeed if attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Timeouts, throttling, connection resets, server-side errors
    Transient,

    /// Authentication, malformed requests, unknown models
    Permanent,
}

impl FailureKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        }
    }

    /// True if the caller should retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that knows whether it is transient or permanent
///
/// Implemented by every provider error so that the retry policy in the
/// extraction core can decide without knowing the provider.
pub trait ClassifiedError: std::error::Error {
    /// Classify this failure
    fn failure_kind(&self) -> FailureKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FailureKind::Transient.is_retryable());
        assert!(!FailureKind::Permanent.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(FailureKind::Transient.to_string(), "transient");
        assert_eq!(FailureKind::Permanent.to_string(), "permanent");
    }
}
