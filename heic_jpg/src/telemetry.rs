//! Fire-and-forget usage events.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    Single,
    Bulk,
}

impl BatchType {
    pub fn for_run_size(items: usize) -> Self {
        if items > 1 {
            BatchType::Bulk
        } else {
            BatchType::Single
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchType::Single => "single",
            BatchType::Bulk => "bulk",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Individual,
    Archive,
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DownloadKind::Individual => "individual",
            DownloadKind::Archive => "archive",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    ConversionSuccess {
        count: usize,
        batch_type: BatchType,
    },
    ConversionError {
        error_class: String,
        message: String,
    },
    #[serde(rename = "file_download")]
    Download { kind: DownloadKind, count: usize },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::ConversionSuccess { .. } => "conversion_success",
            TelemetryEvent::ConversionError { .. } => "conversion_error",
            TelemetryEvent::Download { .. } => "file_download",
        }
    }
}

/// Receives events; delivery is best-effort and never awaited.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Logs every event under the `heic_jpg::telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::ConversionSuccess { count, batch_type } => info!(
                target: "heic_jpg::telemetry",
                event = event.name(),
                count,
                batch_type = %batch_type,
                "Telemetry event"
            ),
            TelemetryEvent::ConversionError {
                error_class,
                message,
            } => info!(
                target: "heic_jpg::telemetry",
                event = event.name(),
                error_class = %error_class,
                error_message = %message,
                "Telemetry event"
            ),
            TelemetryEvent::Download { kind, count } => info!(
                target: "heic_jpg::telemetry",
                event = event.name(),
                kind = %kind,
                count,
                "Telemetry event"
            ),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_type_for_run_size() {
        assert_eq!(BatchType::for_run_size(1), BatchType::Single);
        assert_eq!(BatchType::for_run_size(2), BatchType::Bulk);
        assert_eq!(BatchType::for_run_size(0), BatchType::Single);
    }

    #[test]
    fn test_event_names_match_serde_tags() {
        let events = [
            TelemetryEvent::ConversionSuccess {
                count: 1,
                batch_type: BatchType::Bulk,
            },
            TelemetryEvent::ConversionError {
                error_class: "INVALID_FILE".into(),
                message: "bad".into(),
            },
            TelemetryEvent::Download {
                kind: DownloadKind::Individual,
                count: 3,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn test_sinks_accept_events() {
        let event = TelemetryEvent::Download {
            kind: DownloadKind::Archive,
            count: 2,
        };
        TracingTelemetry.record(event.clone());
        NullTelemetry.record(event);
    }
}
