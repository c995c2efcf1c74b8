//! Representative-frame selection.
//!
//! Picking a frame that actually represents a video is mostly a question of
//! *where* to look: the very start is often black or a title card, and fixed
//! offsets collide with sparse keyframes. [`FrameSelector`] probes the stream
//! once, then searches for a decodable snapshot timestamp starting at
//! `duration × (3 − √5)/2` and multiplying by the same constant on every
//! miss. Repeated multiplication by this golden-ratio conjugate never
//! revisits an earlier candidate (unlike halving, which lands on exact
//! midpoints of prior steps for round durations) and shrinks geometrically,
//! so the search terminates in a bounded number of probes. Once the
//! candidate drops below one second the selector falls back to the first
//! frame with no explicit seek.
//!
//! Still images get no seek at all; their "duration" is meaningless.

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::ThumbqError;
use crate::ffmpeg::MediaTool;

const SQRT_5: f64 = 2.236_067_977_499_79;

/// The smaller golden-ratio conjugate, `(3 − √5)/2 ≈ 0.382`.
pub const SEEK_RATIO: f64 = (3.0 - SQRT_5) / 2.0;

/// Probe result with still-image policy applied.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Codec name of the first video stream.
    pub codec_name: String,
    /// Pixel format of the first video stream.
    pub pixel_format: String,
    /// Duration in seconds; `None` for still images and streams that report
    /// no usable duration.
    pub duration: Option<f64>,
    /// Whether the codec denotes a still image.
    pub is_still_image: bool,
}

/// Frame selection over a [`MediaTool`].
pub struct FrameSelector<'a> {
    tool: &'a dyn MediaTool,
    config: &'a EngineConfig,
}

impl<'a> FrameSelector<'a> {
    /// Create a selector borrowing the tool and policy configuration.
    pub fn new(tool: &'a dyn MediaTool, config: &'a EngineConfig) -> Self {
        Self { tool, config }
    }

    /// Probe `url` and classify its first video stream.
    ///
    /// # Errors
    ///
    /// [`ThumbqError::NoVideoStream`] if the file has no video stream, plus
    /// any tool invocation failure.
    pub fn probe(&self, url: &str) -> Result<StreamInfo, ThumbqError> {
        let report = self.tool.probe(url)?;
        let is_still_image = self.config.is_still_image(&report.codec_name);
        Ok(StreamInfo {
            duration: if is_still_image { None } else { report.duration },
            codec_name: report.codec_name,
            pixel_format: report.pixel_format,
            is_still_image,
        })
    }

    /// Search for a decodable snapshot of `url` and write it to `scratch`.
    ///
    /// Returns the pixel dimensions of the captured frame. The stream may
    /// contain no decodable frame at a candidate timestamp (sparse keyframes,
    /// trailing black); each miss shrinks the candidate by [`SEEK_RATIO`]
    /// until it drops below one second, at which point the first frame is
    /// requested with no explicit seek.
    ///
    /// # Errors
    ///
    /// [`ThumbqError::SnapshotFailed`] if even the no-seek fallback produces
    /// no output, plus any tool invocation failure.
    pub fn select_frame(
        &self,
        url: &str,
        duration: Option<f64>,
        want_alpha: bool,
        scratch: &Path,
    ) -> Result<(u32, u32), ThumbqError> {
        let mut at = duration.map(|seconds| seconds * SEEK_RATIO);
        loop {
            if self.tool.snapshot(url, at, want_alpha, scratch)? {
                return Ok(image::image_dimensions(scratch)?);
            }
            match at {
                Some(seconds) => {
                    let next = seconds * SEEK_RATIO;
                    at = (next >= 1.0).then_some(next);
                    log::debug!("no frame at {seconds:.3}s in {url}, retrying at {at:?}");
                }
                // The no-seek fallback already failed; give up.
                None => return Err(ThumbqError::SnapshotFailed),
            }
        }
    }
}
