//! Conversion backends.
//!
//! [`ConversionBackend`] is the seam the orchestrator drives; it never sees
//! libheif directly. [`LibheifBackend`] is the production implementation:
//! libheif decodes the primary image, `image` encodes the JPEG.

use crate::errors::{ClassifiedError, ErrorKind};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use libheif_rs::{ColorSpace, HeifContext, HeifErrorCode, LibHeif, RgbChroma};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Oldest libheif release with the decode API this backend relies on.
pub const MIN_LIBHEIF_VERSION: [u8; 2] = [1, 7];

/// ISO-BMFF major brands accepted as HEIF payloads.
pub const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1", b"avif",
];

/// Result of the one-time environment probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported { reason: String },
}

impl Capability {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Capability::Supported => None,
            Capability::Unsupported { reason } => Some(reason),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Supported => f.write_str("supported"),
            Capability::Unsupported { reason } => write!(f, "unsupported: {}", reason),
        }
    }
}

#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Probe whether this host can convert at all. Called once per
    /// orchestrator.
    fn check_capability(&self) -> Capability;

    /// Convert one HEIC/HEIF payload to JPEG bytes. `quality` is in `0.0..=1.0`.
    async fn convert(&self, source: Arc<[u8]>, quality: f32) -> Result<Vec<u8>, ClassifiedError>;

    /// Drop per-item scratch state. Called after every item settles.
    fn release(&self) {}
}

/// Map `0.0..=1.0` onto the JPEG encoder's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    if quality.is_nan() {
        return 90;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// True when `bytes` start with an `ftyp` box carrying a HEIF major brand.
pub fn has_heif_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == brand.as_slice())
}

/// Classify a libheif failure.
pub fn classify_heif_error(code: HeifErrorCode, message: &str) -> ClassifiedError {
    match code {
        HeifErrorCode::InvalidInput
        | HeifErrorCode::UnsupportedFileType
        | HeifErrorCode::UnsupportedFeature => ClassifiedError::invalid_input(format!(
            "This HEIC file appears to be corrupted or invalid: {}",
            message
        )),
        HeifErrorCode::MemoryAllocationError => ClassifiedError::resource_exhausted(
            "Not enough memory to convert this file. Try a smaller file.",
        ),
        HeifErrorCode::DecoderPluginError => {
            ClassifiedError::conversion_failed(format!("Conversion failed: {}", message))
        }
        _ => ClassifiedError::from_message(message),
    }
}

/// Pack possibly padded rows into a tight `width * channels` buffer.
pub fn pack_rows(
    data: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    channels: usize,
) -> Option<Vec<u8>> {
    let row_len = width.checked_mul(channels)?;
    if stride < row_len {
        return None;
    }
    if stride == row_len {
        return data.get(..row_len * height).map(<[u8]>::to_vec);
    }

    let mut packed = Vec::with_capacity(row_len * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(data.get(start..start + row_len)?);
    }
    Some(packed)
}

fn version_string(version: [u8; 3]) -> String {
    format!("{}.{}.{}", version[0], version[1], version[2])
}

fn probe_libheif() -> Result<[u8; 3], String> {
    let lib = LibHeif::new_checked().map_err(|e| format!("libheif failed to initialise: {}", e))?;
    let version = lib.version();
    if [version[0], version[1]] < MIN_LIBHEIF_VERSION {
        return Err(format!(
            "libheif {} found; {}.{} or newer is required",
            version_string(version),
            MIN_LIBHEIF_VERSION[0],
            MIN_LIBHEIF_VERSION[1]
        ));
    }
    Ok(version)
}

fn decode_and_encode(source: &[u8], quality: u8) -> Result<Vec<u8>, ClassifiedError> {
    let lib_heif = LibHeif::new();

    let ctx = HeifContext::read_from_bytes(source)
        .map_err(|e| classify_heif_error(e.code, &e.message))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| classify_heif_error(e.code, &e.message))?;

    let width = handle.width();
    let height = handle.height();

    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| classify_heif_error(e.code, &e.message))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ClassifiedError::conversion_failed("Conversion failed: no RGB plane"))?;

    let rgb = pack_rows(
        plane.data,
        width as usize,
        height as usize,
        plane.stride,
        3,
    )
    .ok_or_else(|| ClassifiedError::conversion_failed("Conversion failed: truncated RGB plane"))?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| ClassifiedError::from_message(&e.to_string()))?;

    debug!(width, height, quality, bytes = jpeg.len(), "Encoded JPEG");
    Ok(jpeg)
}

/// libheif decode + JPEG encode.
///
/// libheif is initialised on first use; concurrent first callers share the
/// same initialisation.
#[derive(Default)]
pub struct LibheifBackend {
    runtime: OnceCell<[u8; 3]>,
}

impl LibheifBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_loaded(&self) -> Result<[u8; 3], ClassifiedError> {
        self.runtime
            .get_or_try_init(|| async {
                let version = tokio::task::spawn_blocking(probe_libheif)
                    .await
                    .map_err(|e| ClassifiedError::unclassified(e.to_string()))?
                    .map_err(ClassifiedError::unsupported)?;
                info!(version = %version_string(version), "libheif loaded");
                Ok::<_, ClassifiedError>(version)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ConversionBackend for LibheifBackend {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn check_capability(&self) -> Capability {
        match probe_libheif() {
            Ok(_) => Capability::Supported,
            Err(reason) => {
                warn!(%reason, "HEIC decoding unavailable");
                Capability::Unsupported { reason }
            }
        }
    }

    async fn convert(&self, source: Arc<[u8]>, quality: f32) -> Result<Vec<u8>, ClassifiedError> {
        self.ensure_loaded().await?;

        if !has_heif_signature(&source) {
            return Err(ClassifiedError::invalid_input(
                "File must be HEIC or HEIF format",
            ));
        }

        let quality = jpeg_quality(quality);
        tokio::task::spawn_blocking(move || decode_and_encode(&source, quality))
            .await
            .map_err(|e| ClassifiedError::new(ErrorKind::Unclassified, e.to_string()))?
    }
}
