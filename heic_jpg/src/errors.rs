//! Error taxonomy for conversions and the crate error types.
//!
//! Backends report a [`ClassifiedError`]; the [`ErrorKind`] it carries
//! decides whether the orchestrator retries. Text heuristics are only a
//! fallback for backends that have nothing but a message.

use crate::item::{ItemId, ItemStatus};
use serde::{Deserialize, Serialize};
use shared_utils::ErrorCategory;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The host cannot run the backend at all.
    UnsupportedEnvironment,
    /// Not a recognizable HEIC/HEIF payload, or corrupted.
    InvalidInput,
    /// Out-of-memory-like condition.
    ResourceExhausted,
    /// Generic backend failure with a message.
    ConversionFailed,
    Unclassified,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::UnsupportedEnvironment,
        ErrorKind::InvalidInput,
        ErrorKind::ResourceExhausted,
        ErrorKind::ConversionFailed,
        ErrorKind::Unclassified,
    ];

    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ConversionFailed | ErrorKind::Unclassified)
    }

    pub fn category(self) -> ErrorCategory {
        if self.is_retryable() {
            ErrorCategory::Recoverable
        } else {
            ErrorCategory::Fatal
        }
    }

    /// Stable class name reported to telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedEnvironment => "UNSUPPORTED_ENVIRONMENT",
            ErrorKind::InvalidInput => "INVALID_FILE",
            ErrorKind::ResourceExhausted => "MEMORY_ERROR",
            ErrorKind::ConversionFailed => "CONVERSION_FAILED",
            ErrorKind::Unclassified => "UNKNOWN_ERROR",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedEnvironment => {
                "This system cannot decode HEIC images. Install libheif 1.7 or newer."
            }
            ErrorKind::InvalidInput => {
                "Invalid HEIC file. Please select a valid HEIC or HEIF file."
            }
            ErrorKind::ResourceExhausted => {
                "Not enough memory to convert this file. Try converting fewer files at once."
            }
            ErrorKind::ConversionFailed => {
                "Conversion failed. Please try again or select a different file."
            }
            ErrorKind::Unclassified => "An unexpected error occurred. Please try again.",
        }
    }

    /// Best-effort classification of a free-text backend message.
    pub fn classify_message(message: &str) -> ErrorKind {
        if message.contains("memory") || message.contains("Memory") {
            ErrorKind::ResourceExhausted
        } else if message.contains("Invalid") || message.contains("corrupt") {
            ErrorKind::InvalidInput
        } else if !message.trim().is_empty() {
            ErrorKind::ConversionFailed
        } else {
            ErrorKind::Unclassified
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend failure with its class and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedEnvironment, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn conversion_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConversionFailed, message)
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    /// Classify a raw backend message and phrase it for the user.
    pub fn from_message(raw: &str) -> Self {
        match ErrorKind::classify_message(raw) {
            ErrorKind::ResourceExhausted => Self::resource_exhausted(
                "Not enough memory to convert this file. Try a smaller file.",
            ),
            ErrorKind::InvalidInput => {
                Self::invalid_input("This HEIC file appears to be corrupted or invalid.")
            }
            ErrorKind::ConversionFailed => {
                Self::conversion_failed(format!("Conversion failed: {}", raw.trim()))
            }
            _ => Self::unclassified("An unknown error occurred during conversion"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors of the library outside the per-item conversion path.
#[derive(Debug, Error)]
pub enum HeicJpgError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid status transition for {id}: {from} → {to}")]
    InvalidTransition {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, HeicJpgError>;

/// Why a batch submission was refused. No item state changes when this
/// is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejected {
    /// Capability check failed; carries the backend's reason verbatim.
    #[error("{0}")]
    Unsupported(String),

    #[error("A batch is already running")]
    AlreadyRunning,

    #[error("{0} is not waiting for conversion")]
    NotWaiting(ItemId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        let retryable: Vec<_> = ErrorKind::ALL
            .into_iter()
            .filter(|k| k.is_retryable())
            .collect();
        assert_eq!(
            retryable,
            vec![ErrorKind::ConversionFailed, ErrorKind::Unclassified]
        );
    }

    #[test]
    fn test_category_follows_retryability() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.category().should_retry(), kind.is_retryable());
        }
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            ErrorKind::classify_message("Out of Memory while decoding"),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            ErrorKind::classify_message("not enough memory"),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            ErrorKind::classify_message("Invalid input: No 'ftyp' box"),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ErrorKind::classify_message("file is corrupt"),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ErrorKind::classify_message("decoder plugin crashed"),
            ErrorKind::ConversionFailed
        );
        assert_eq!(ErrorKind::classify_message("  "), ErrorKind::Unclassified);
    }

    #[test]
    fn test_from_message_phrasing() {
        let err = ClassifiedError::from_message("Invalid box size");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(err.message.contains("corrupted or invalid"));

        let err = ClassifiedError::from_message("timeout in plugin");
        assert_eq!(err.kind, ErrorKind::ConversionFailed);
        assert_eq!(err.message, "Conversion failed: timeout in plugin");
        assert!(err.is_retryable());

        let err = ClassifiedError::from_message("");
        assert_eq!(err.kind, ErrorKind::Unclassified);
    }

    #[test]
    fn test_telemetry_class_names() {
        assert_eq!(ErrorKind::InvalidInput.as_str(), "INVALID_FILE");
        assert_eq!(ErrorKind::ResourceExhausted.to_string(), "MEMORY_ERROR");
        assert_eq!(ErrorKind::Unclassified.as_str(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let messages: std::collections::HashSet<_> =
            ErrorKind::ALL.iter().map(|k| k.user_message()).collect();
        assert_eq!(messages.len(), ErrorKind::ALL.len());
        assert!(ErrorKind::InvalidInput.user_message().starts_with("Invalid HEIC file"));
    }

    #[test]
    fn test_classified_error_display_is_message() {
        let err = ClassifiedError::conversion_failed("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_batch_rejected_unsupported_is_verbatim() {
        let reason = "libheif 1.6.2 found; 1.7 or newer is required";
        assert_eq!(BatchRejected::Unsupported(reason.into()).to_string(), reason);
    }
}
