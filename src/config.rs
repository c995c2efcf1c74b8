//! Engine configuration.
//!
//! [`EngineConfig`] is a builder that carries worker-pool sizing, the output
//! pixel budget, tool binary locations, and the codec/extension policy sets
//! through engine construction without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use thumbq::{Engine, EngineConfig};
//!
//! let config = EngineConfig::new()
//!     .with_workers(8)
//!     .with_pixel_budget(200_000)
//!     .with_base_url("http://127.0.0.1:8080");
//! let engine = Engine::start(config);
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

/// Default number of worker threads draining the queue.
pub const DEFAULT_WORKERS: usize = 4;

/// Default output pixel budget (width × height) for generated thumbnails.
pub const DEFAULT_PIXEL_BUDGET: u64 = 100_000;

/// Codecs that denote a still image rather than a video stream.
///
/// For these, duration has no meaning and no time-based seeking is attempted.
const STILL_IMAGE_CODECS: &[&str] = &["mjpeg", "png", "bmp", "tiff"];

/// File suffixes that are never expected to decode. Generation failures for
/// these keys are recorded but not logged, to keep the failure log useful.
const IGNORED_EXTENSIONS: &[&str] = &[
    "bc%21",
    "txt",
    "torrent",
    "srt",
    "downloading",
    "nfo",
    "zip",
    "rar",
    "ini",
];

/// Configuration for an [`Engine`](crate::Engine).
///
/// All fields have working defaults; a default-constructed config runs four
/// workers with a 100 000-pixel budget against `ffmpeg`/`ffprobe` found on
/// `PATH`.
#[derive(Debug, Clone)]
#[must_use]
pub struct EngineConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum `width * height` of a generated thumbnail.
    pub pixel_budget: u64,
    /// Base URL the index serves files under; keys are joined onto it.
    /// `None` means keys are already complete URLs or local paths.
    pub base_url: Option<String>,
    /// Path to the `ffmpeg` binary.
    pub ffmpeg: PathBuf,
    /// Path to the `ffprobe` binary.
    pub ffprobe: PathBuf,
    /// Codec names treated as still images.
    pub still_image_codecs: HashSet<String>,
    /// Lowercased suffixes whose generation failures are not logged.
    pub ignored_extensions: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            pixel_budget: DEFAULT_PIXEL_BUDGET,
            base_url: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            still_image_codecs: STILL_IMAGE_CODECS.iter().map(|s| s.to_string()).collect(),
            ignored_extensions: IGNORED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Set the worker thread count. Clamped to a minimum of 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the output pixel budget. Clamped to a minimum of 256 (16 × 16,
    /// the smallest output the encoder alignment permits).
    pub fn with_pixel_budget(mut self, budget: u64) -> Self {
        self.pixel_budget = budget.max(256);
        self
    }

    /// Set the base URL that keys are resolved against.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Override the `ffmpeg` binary location.
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = path.into();
        self
    }

    /// Override the `ffprobe` binary location.
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe = path.into();
        self
    }

    /// Returns `true` if `codec_name` denotes a still image.
    pub fn is_still_image(&self, codec_name: &str) -> bool {
        self.still_image_codecs.contains(codec_name)
    }

    /// Returns `true` if failures for `key` should not be logged, judged by
    /// the lowercased suffix after the final `.`.
    pub fn is_ignored_key(&self, key: &str) -> bool {
        match key.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                self.ignored_extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_key_matches_suffix_case_insensitively() {
        let config = EngineConfig::new();
        assert!(config.is_ignored_key("/films/readme.TXT"));
        assert!(config.is_ignored_key("/films/show.s01.nfo"));
        assert!(!config.is_ignored_key("/films/show.s01.mkv"));
        assert!(!config.is_ignored_key("no-extension"));
        assert!(!config.is_ignored_key("trailing-dot."));
    }

    #[test]
    fn still_image_set_covers_the_known_codecs() {
        let config = EngineConfig::new();
        for codec in ["mjpeg", "png", "bmp", "tiff"] {
            assert!(config.is_still_image(codec), "{codec} should be a still image");
        }
        assert!(!config.is_still_image("h264"));
    }
}
