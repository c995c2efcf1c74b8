//! Thumbnail generation pipeline.
//!
//! [`ThumbnailPipeline::generate`] turns one media URL into an encoded
//! thumbnail: probe the stream, search for a representative frame (see
//! [`selector`](crate::selector)), cap the output size under a pixel budget,
//! composite transparent still images onto white, and hand the frame to the
//! external encoder for the final scale + JPEG step.
//!
//! The budget math mirrors the downstream encoder's constraint: the short
//! side must be a multiple of 16, so the scale factor is recomputed from the
//! rounded-down short side and applied to both dimensions, preserving the
//! aspect ratio within rounding.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::{ImageReader, RgbImage, RgbaImage};

use crate::cache::Thumbnail;
use crate::config::EngineConfig;
use crate::error::ThumbqError;
use crate::ffmpeg::MediaTool;
use crate::selector::{FrameSelector, StreamInfo};

/// Fit `width`×`height` under `budget` pixels.
///
/// Returns the input unchanged when already within budget. Otherwise the
/// short side is scaled by `sqrt(budget / (w*h))` and rounded *down* to a
/// multiple of 16, and both dimensions are recomputed from the resulting
/// ratio.
pub fn fit_pixel_budget(width: u32, height: u32, budget: u64) -> (u32, u32) {
    let pixels = width as u64 * height as u64;
    if pixels <= budget {
        return (width, height);
    }
    let scale = (budget as f64 / pixels as f64).sqrt();
    let short = width.min(height) as f64;
    let scale = (short * scale / 16.0).floor() * 16.0 / short;
    let scaled_width = (width as f64 * scale).round() as u32;
    let scaled_height = (height as f64 * scale).round() as u32;
    (scaled_width, scaled_height)
}

/// Composite an RGBA image onto an opaque white background.
///
/// Per channel: `out = alpha/255 × channel + (255 − alpha)`. Fully
/// transparent pixels become white, fully opaque pixels keep their original
/// color, and partial alpha blends linearly in between. This runs before the
/// final encode because the thumbnail format cannot represent transparency.
pub fn composite_over_white(source: &RgbaImage) -> RgbImage {
    let mut output = RgbImage::new(source.width(), source.height());
    for (source_pixel, output_pixel) in source.pixels().zip(output.pixels_mut()) {
        let [red, green, blue, alpha] = source_pixel.0;
        let alpha = alpha as u16;
        let blend = |channel: u8| ((alpha * channel as u16) / 255 + (255 - alpha)) as u8;
        output_pixel.0 = [blend(red), blend(green), blend(blue)];
    }
    output
}

/// Orchestrates probe, frame selection, compositing, and the final encode.
pub struct ThumbnailPipeline {
    tool: Arc<dyn MediaTool>,
    config: Arc<EngineConfig>,
}

impl ThumbnailPipeline {
    /// Create a pipeline over the given tool and configuration.
    pub fn new(tool: Arc<dyn MediaTool>, config: Arc<EngineConfig>) -> Self {
        Self { tool, config }
    }

    /// Whether the stream needs compositing onto an opaque background:
    /// a still image whose pixel format is not already opaque RGB.
    fn needs_composite(&self, info: &StreamInfo) -> bool {
        info.is_still_image && info.pixel_format != "rgb24"
    }

    /// Generate a thumbnail for `url`, using `scratch` as the intermediate
    /// frame file (reused across calls by the owning worker).
    ///
    /// # Errors
    ///
    /// Any probe, selection, or encode failure. Callers record errors as a
    /// permanent [`Outcome::Failed`](crate::Outcome) for the key.
    pub fn generate(&self, url: &str, scratch: &Path) -> Result<Thumbnail, ThumbqError> {
        let selector = FrameSelector::new(self.tool.as_ref(), &self.config);

        let probe_started = Instant::now();
        let info = selector.probe(url)?;
        let want_alpha = self.needs_composite(&info);

        let snapshot_started = Instant::now();
        let (width, height) = selector.select_frame(url, info.duration, want_alpha, scratch)?;
        let (output_width, output_height) =
            fit_pixel_budget(width, height, self.config.pixel_budget);

        if want_alpha {
            let frame = ImageReader::open(scratch)?.decode()?.into_rgba8();
            let composited = composite_over_white(&frame);
            composited
                .save(scratch)
                .map_err(ThumbqError::ImageError)?;
        }

        let encode_started = Instant::now();
        let bytes = self
            .tool
            .encode_thumbnail(scratch, output_width, output_height)?;

        log::debug!(
            "generated thumbnail for {url}: probe {:.1}ms, snapshot {:.1}ms, encode {:.1}ms, \
             {width}x{height} -> {output_width}x{output_height}, composited: {want_alpha}",
            snapshot_started.duration_since(probe_started).as_secs_f64() * 1000.0,
            encode_started.duration_since(snapshot_started).as_secs_f64() * 1000.0,
            encode_started.elapsed().as_secs_f64() * 1000.0,
        );

        Ok(Thumbnail {
            codec_name: info.codec_name,
            duration: info.duration,
            pixel_format: info.pixel_format,
            is_still_image: info.is_still_image,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_budget_dimensions_pass_through() {
        assert_eq!(fit_pixel_budget(320, 240, 100_000), (320, 240));
        assert_eq!(fit_pixel_budget(1, 1, 100_000), (1, 1));
    }

    #[test]
    fn over_budget_short_side_is_a_multiple_of_16() {
        for (width, height) in [(1920, 1080), (1080, 1920), (4000, 3000), (640, 481)] {
            let (w, h) = fit_pixel_budget(width, height, 100_000);
            assert_eq!(w.min(h) % 16, 0, "{width}x{height} -> {w}x{h}");
            assert!(
                w as u64 * h as u64 <= 100_000,
                "{width}x{height} -> {w}x{h} exceeds budget"
            );
        }
    }

    #[test]
    fn over_budget_aspect_ratio_is_preserved_within_rounding() {
        let (w, h) = fit_pixel_budget(1920, 1080, 100_000);
        let original = 1920.0 / 1080.0;
        let scaled = w as f64 / h as f64;
        assert!((original - scaled).abs() < 0.01, "{w}x{h}");
    }

    #[test]
    fn compositing_maps_transparent_to_white_and_opaque_to_original() {
        let mut source = RgbaImage::new(3, 1);
        source.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        source.put_pixel(1, 0, image::Rgba([10, 20, 30, 0]));
        source.put_pixel(2, 0, image::Rgba([100, 100, 100, 128]));

        let output = composite_over_white(&source);
        assert_eq!(output.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(output.get_pixel(1, 0).0, [255, 255, 255]);
        // alpha 128: 128*100/255 + 127 = 50 + 127
        assert_eq!(output.get_pixel(2, 0).0, [177, 177, 177]);
    }
}
