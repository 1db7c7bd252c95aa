//! Error types for embedding and extraction.

use std::fmt;
use thiserror::Error;

/// Result type alias for outguess operations.
pub type Result<T> = std::result::Result<T, OutguessError>;

/// Errors that can occur while decoding, embedding or extracting.
#[derive(Error)]
pub enum OutguessError {
    /// The byte stream is not a supported baseline JPEG, or it is corrupt.
    #[error("unsupported or corrupt JPEG: {reason}")]
    Format { reason: String },

    /// An option is outside its allowed range.
    #[error("{param} must be within {min}..={max}, got {value}")]
    Range {
        param: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The framed payload does not fit into the eligible coefficients.
    #[error("capacity exceeded: payload requires {required_bits} bits but only {available_bits} available")]
    Capacity {
        required_bits: usize,
        available_bits: usize,
    },

    /// No valid frame was found. Wrong password, no payload and corruption
    /// all end up here and cannot be told apart.
    #[error("no verifiable payload found: {reason}")]
    Verification { reason: String },

    /// The embedded image did not read back as the message it was given.
    #[error("embedding integrity check failed: {reason}")]
    Integrity { reason: String },

    /// I/O failure at the file boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OutguessError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        OutguessError::Format {
            reason: reason.into(),
        }
    }

    pub(crate) fn verification(reason: impl Into<String>) -> Self {
        OutguessError::Verification {
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(reason: impl Into<String>) -> Self {
        OutguessError::Integrity {
            reason: reason.into(),
        }
    }

    /// Whether the caller can sensibly retry with other credentials.
    ///
    /// Only verification failures qualify; everything else needs different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OutguessError::Verification { .. })
    }
}

impl fmt::Debug for OutguessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Display for Debug so unwrap() shows user-friendly messages
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_verification_is_recoverable() {
        assert!(OutguessError::verification("bad magic").is_recoverable());
        assert!(!OutguessError::format("truncated").is_recoverable());
        assert!(!OutguessError::integrity("payload differs").is_recoverable());
        assert!(!OutguessError::Capacity {
            required_bits: 10,
            available_bits: 5
        }
        .is_recoverable());
    }

    #[test]
    fn test_range_message() {
        let err = OutguessError::Range {
            param: "quality",
            value: 0,
            min: 1,
            max: 100,
        };
        assert_eq!(format!("{err:?}"), "quality must be within 1..=100, got 0");
    }

    #[test]
    fn test_integrity_message() {
        let err = OutguessError::integrity("checksum mismatch");
        assert_eq!(err.to_string(), "embedding integrity check failed: checksum mismatch");
    }
}
