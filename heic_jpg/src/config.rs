//! Pipeline configuration.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_QUALITY: f32 = 0.9;
pub const DEFAULT_PREVIEW_MAX_DIMENSION: u32 = 200;
pub const DEFAULT_INTER_ITEM_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// JPEG quality in `0.0..=1.0`.
    pub quality: f32,
    /// Longest side of generated previews, in pixels.
    pub preview_max_dimension: u32,
    /// Pause between items so the host stays responsive.
    #[serde(with = "crate::retry::duration_ms")]
    pub inter_item_delay: Duration,
    pub retry: RetryPolicy,
    /// Upper bound for a single backend call. `None` waits indefinitely.
    #[serde(default, with = "opt_duration_ms")]
    pub conversion_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            preview_max_dimension: DEFAULT_PREVIEW_MAX_DIMENSION,
            inter_item_delay: DEFAULT_INTER_ITEM_DELAY,
            retry: RetryPolicy::default(),
            conversion_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = if quality.is_nan() {
            DEFAULT_QUALITY
        } else {
            quality.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_preview_max_dimension(mut self, px: u32) -> Self {
        self.preview_max_dimension = px.max(1);
        self
    }

    pub fn with_inter_item_delay(mut self, delay: Duration) -> Self {
        self.inter_item_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_conversion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.conversion_timeout = timeout;
        self
    }
}

mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.quality, 0.9);
        assert_eq!(config.preview_max_dimension, 200);
        assert_eq!(config.inter_item_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.conversion_timeout.is_none());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(PipelineConfig::new().with_quality(1.7).quality, 1.0);
        assert_eq!(PipelineConfig::new().with_quality(-0.2).quality, 0.0);
        assert_eq!(PipelineConfig::new().with_quality(f32::NAN).quality, 0.9);
    }

    #[test]
    fn test_json_round_trip_with_timeout() {
        let config = PipelineConfig::new().with_conversion_timeout(Some(Duration::from_secs(30)));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["conversion_timeout"], 30_000);
        assert_eq!(json["inter_item_delay"], 100);

        let back: PipelineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_timeout_deserializes_as_none() {
        let mut json = serde_json::to_value(PipelineConfig::default()).unwrap();
        json.as_object_mut().unwrap().remove("conversion_timeout");
        let config: PipelineConfig = serde_json::from_value(json).unwrap();
        assert!(config.conversion_timeout.is_none());
    }
}
