//! Pipeline configuration.
//!
//! All tunables in one serializable struct so an integrating application
//! can persist them as JSON alongside its own settings.

use serde::{Deserialize, Serialize};

/// Tunables for the thumbnail pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Target thumbnail box width in pixels. Rendered thumbnails fit
    /// inside `thumb_width x thumb_height` with aspect ratio preserved.
    pub thumb_width: u32,

    /// Target thumbnail box height in pixels.
    pub thumb_height: u32,

    /// JPEG re-encode quality (1-100). 75 keeps thumbnails small without
    /// visible blocking at grid sizes.
    pub jpeg_quality: u8,

    /// Number of generation workers. 0 = one per available processor.
    pub workers: usize,

    /// Quiet period in seconds after the last filesystem event before a
    /// watcher-triggered rescan fires.
    pub quiet_period_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thumb_width: 160,
            thumb_height: 120,
            jpeg_quality: 75,
            workers: 0,
            quiet_period_secs: 3,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker count with the auto setting resolved.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    /// Convert to JSON string for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.quiet_period_secs, 3);
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = PipelineConfig::default();
        config.thumb_width = 120;
        config.thumb_height = 75;
        config.workers = 2;

        let json = config.to_json().unwrap();
        let restored = PipelineConfig::from_json(&json).unwrap();

        assert_eq!(config, restored);
        assert_eq!(restored.effective_workers(), 2);
    }
}
