//! Shared test support: a scripted [`MediaTool`] that records every call.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use image::{Rgba, RgbaImage};
use thumbq::{MediaTool, ProbeReport, ThumbqError};

/// What the scripted probe should answer.
pub enum ProbeScript {
    /// Return this report.
    Report(ProbeReport),
    /// Fail with `NoVideoStream`.
    NoVideo,
}

/// Everything the tool was asked to do, in order.
#[derive(Default)]
pub struct Calls {
    pub probes: usize,
    /// `(seek seconds, want_alpha)` per snapshot request.
    pub snapshots: Vec<(Option<f64>, bool)>,
    /// `(width, height)` per encode request.
    pub encodes: Vec<(u32, u32)>,
    pub converts: usize,
}

/// Scripted stand-in for the external media tool.
///
/// Snapshots succeed when the requested seek is `None` (unless
/// `fail_first_frame` is set) or at most `decodable_until` seconds; on
/// success a real image of `frame_size` filled with `frame_pixel` is written
/// to the scratch path so dimension reads and compositing operate on actual
/// pixel data.
pub struct ScriptedTool {
    pub probe_script: ProbeScript,
    pub decodable_until: f64,
    pub fail_first_frame: bool,
    pub frame_size: (u32, u32),
    pub frame_pixel: [u8; 4],
    /// `None` makes `convert_picture` fail.
    pub convert_result: Option<Vec<u8>>,
    pub calls: Mutex<Calls>,
}

/// The bytes the scripted encoder always returns.
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

impl ScriptedTool {
    /// A decodable video stream with the given duration.
    pub fn video(duration: f64) -> Self {
        Self::with_report(ProbeReport {
            codec_name: "h264".to_string(),
            pixel_format: "yuv420p".to_string(),
            duration: Some(duration),
        })
    }

    /// A still PNG with an alpha-capable pixel format.
    pub fn still_png() -> Self {
        Self::with_report(ProbeReport {
            codec_name: "png".to_string(),
            pixel_format: "rgba".to_string(),
            duration: None,
        })
    }

    /// A file without any video stream.
    pub fn no_video() -> Self {
        Self {
            probe_script: ProbeScript::NoVideo,
            ..Self::video(0.0)
        }
    }

    pub fn with_report(report: ProbeReport) -> Self {
        Self {
            probe_script: ProbeScript::Report(report),
            decodable_until: f64::MAX,
            fail_first_frame: false,
            frame_size: (64, 48),
            frame_pixel: [10, 20, 30, 255],
            convert_result: Some(b"converted-png".to_vec()),
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Make seeks beyond `seconds` produce no output.
    pub fn decodable_until(mut self, seconds: f64) -> Self {
        self.decodable_until = seconds;
        self
    }

    pub fn fail_first_frame(mut self) -> Self {
        self.fail_first_frame = true;
        self
    }

    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    pub fn frame_pixel(mut self, pixel: [u8; 4]) -> Self {
        self.frame_pixel = pixel;
        self
    }

    pub fn convert_fails(mut self) -> Self {
        self.convert_result = None;
        self
    }
}

impl MediaTool for ScriptedTool {
    fn probe(&self, _url: &str) -> Result<ProbeReport, ThumbqError> {
        self.calls.lock().unwrap().probes += 1;
        match &self.probe_script {
            ProbeScript::Report(report) => Ok(report.clone()),
            ProbeScript::NoVideo => Err(ThumbqError::NoVideoStream),
        }
    }

    fn snapshot(
        &self,
        _url: &str,
        at: Option<f64>,
        want_alpha: bool,
        scratch: &Path,
    ) -> Result<bool, ThumbqError> {
        self.calls.lock().unwrap().snapshots.push((at, want_alpha));
        let produced = match at {
            None => !self.fail_first_frame,
            Some(seconds) => seconds <= self.decodable_until,
        };
        if produced {
            let (width, height) = self.frame_size;
            let frame = RgbaImage::from_pixel(width, height, Rgba(self.frame_pixel));
            frame
                .save(scratch)
                .expect("scripted tool failed to write scratch frame");
        }
        Ok(produced)
    }

    fn encode_thumbnail(
        &self,
        _scratch: &Path,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ThumbqError> {
        self.calls.lock().unwrap().encodes.push((width, height));
        Ok(FAKE_JPEG.to_vec())
    }

    fn convert_picture(&self, _url: &str, _want_alpha: bool) -> Result<Vec<u8>, ThumbqError> {
        self.calls.lock().unwrap().converts += 1;
        match &self.convert_result {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ThumbqError::ToolFailed {
                tool: "ffmpeg",
                context: "scripted conversion failure".to_string(),
            }),
        }
    }
}
