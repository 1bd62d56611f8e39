//! HEIC/HEIF → JPG batch conversion.
//!
//! The [`Orchestrator`] drives a list of [`ConversionItem`]s through a
//! [`ConversionBackend`] one at a time, retrying transient failures with
//! exponential backoff and publishing [`BatchSnapshot`]s to observers.
//! Intake validation, preview generation, telemetry and output writing are
//! separate modules so the orchestrator only depends on traits.

pub mod backend;
pub mod config;
pub mod errors;
pub mod intake;
pub mod item;
pub mod orchestrator;
pub mod output;
pub mod recovery;
pub mod retry;
pub mod telemetry;
pub mod thumbnail;

pub use backend::{Capability, ConversionBackend, LibheifBackend};
pub use config::PipelineConfig;
pub use errors::{BatchRejected, ClassifiedError, ErrorKind, HeicJpgError, Result};
pub use intake::{load_items, IntakePolicy, IntakeReport};
pub use item::{BatchPhase, BatchProgress, BatchSnapshot, ConversionItem, ItemId, ItemStatus};
pub use orchestrator::Orchestrator;
pub use output::{write_outputs, OutputFile, OutputSummary};
pub use recovery::{suggestions, Suggestion};
pub use retry::RetryPolicy;
pub use telemetry::{
    BatchType, DownloadKind, NullTelemetry, TelemetryEvent, TelemetrySink, TracingTelemetry,
};
pub use thumbnail::{ImagePreviewGenerator, PreviewGenerator};
