//! Preview images for converted items.

use crate::errors::{HeicJpgError, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use std::sync::Arc;

/// JPEG quality of generated previews.
pub const PREVIEW_JPEG_QUALITY: u8 = 80;

#[async_trait]
pub trait PreviewGenerator: Send + Sync {
    /// Build a small JPEG whose longer side is at most `max_dimension`.
    async fn make_preview(&self, jpeg: Arc<[u8]>, max_dimension: u32) -> Result<Vec<u8>>;
}

/// Decodes the converted JPEG and downsizes it with `image`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagePreviewGenerator;

impl ImagePreviewGenerator {
    pub fn new() -> Self {
        Self
    }
}

/// Scale `(width, height)` so the longer side fits `max_dimension`.
/// Never upscales and never returns a zero side.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

fn render_preview(jpeg: &[u8], max_dimension: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?;
    let (w, h) = fit_within(img.width(), img.height(), max_dimension);
    let thumb = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.thumbnail_exact(w, h)
    };

    let rgb = thumb.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, PREVIEW_JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

#[async_trait]
impl PreviewGenerator for ImagePreviewGenerator {
    async fn make_preview(&self, jpeg: Arc<[u8]>, max_dimension: u32) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || render_preview(&jpeg, max_dimension))
            .await
            .map_err(HeicJpgError::from)?
    }
}
