//! External media tool invocation.
//!
//! The decoder is a black box to this crate: everything it does is reached
//! through the narrow [`MediaTool`] trait, and [`FfmpegTool`] implements that
//! trait by spawning `ffprobe`/`ffmpeg` subprocesses. Workers never link
//! against a decoder; a hung or missing binary is an opaque generation
//! failure, not a crash.
//!
//! Argument shapes deliberately stay close to what the tool is known to
//! handle well: single-threaded decode (`-threads 1`, the parallelism lives
//! in the worker pool), one frame per invocation, metadata stripped from
//! snapshot output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde::Deserialize;

use crate::error::ThumbqError;

/// Reduced probe result for the first video stream of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Codec name as reported by the tool (e.g. `"h264"`, `"png"`).
    pub codec_name: String,
    /// Pixel format of the stream (e.g. `"yuv420p"`, `"rgba"`).
    pub pixel_format: String,
    /// Duration in seconds, preferring the stream value over the container
    /// value. `None` when neither is present or parseable.
    pub duration: Option<f64>,
}

/// Narrow contract with the external media-decoding collaborator.
///
/// All methods are synchronous and blocking; the worker pool provides the
/// concurrency. Implementations must be shareable across worker threads.
pub trait MediaTool: Send + Sync {
    /// Probe `url` and return codec, pixel format, and duration of its first
    /// video stream.
    ///
    /// # Errors
    ///
    /// [`ThumbqError::NoVideoStream`] when the file has no video stream;
    /// otherwise tool spawn/exit/parse failures.
    fn probe(&self, url: &str) -> Result<ProbeReport, ThumbqError>;

    /// Decode one frame of `url` into `scratch`, seeking to `at` seconds
    /// when given.
    ///
    /// Returns `true` if an output file was produced. A seek that lands
    /// outside any decodable frame legitimately produces no output and is
    /// *not* an error; callers retry with an earlier timestamp. When
    /// `want_alpha` is set the frame is written with an alpha channel so it
    /// can be composited afterwards.
    fn snapshot(
        &self,
        url: &str,
        at: Option<f64>,
        want_alpha: bool,
        scratch: &Path,
    ) -> Result<bool, ThumbqError>;

    /// Scale the frame in `scratch` to `width`×`height` and encode it as the
    /// final JPEG thumbnail payload.
    fn encode_thumbnail(
        &self,
        scratch: &Path,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ThumbqError>;

    /// Convert the picture at `url` to a full-resolution PNG, preserving the
    /// alpha channel when `want_alpha` is set.
    fn convert_picture(&self, url: &str, want_alpha: bool) -> Result<Vec<u8>, ThumbqError>;
}

/// [`MediaTool`] implementation driving the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTool {
    /// Create a tool driver using the given binary locations.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    fn run(&self, tool: &'static str, command: &mut Command) -> Result<Output, ThumbqError> {
        command
            .stdin(Stdio::null())
            .output()
            .map_err(|error| ThumbqError::ToolStart { tool, reason: error.to_string() })
    }
}

impl MediaTool for FfmpegTool {
    fn probe(&self, url: &str) -> Result<ProbeReport, ThumbqError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet", "-threads", "1"])
            .args(["-print_format", "json", "-show_streams", "-show_format"])
            .arg(url)
            .stderr(Stdio::null());

        let output = self.run("ffprobe", &mut command)?;
        if !output.status.success() {
            return Err(ThumbqError::ToolFailed {
                tool: "ffprobe",
                context: format!("probing {url}"),
            });
        }
        parse_probe_output(&output.stdout)
    }

    fn snapshot(
        &self,
        url: &str,
        at: Option<f64>,
        want_alpha: bool,
        scratch: &Path,
    ) -> Result<bool, ThumbqError> {
        // A leftover frame from an earlier job must not count as output.
        match std::fs::remove_file(scratch) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }

        let mut command = Command::new(&self.ffmpeg);
        command.args(["-hide_banner", "-loglevel", "quiet", "-threads", "1"]);
        if let Some(seconds) = at {
            command.arg("-ss").arg(seconds.to_string());
        }
        command
            .args(["-i", url])
            .args(["-map", "v:0", "-map_metadata", "-1"])
            .args(["-frames:v", "1", "-update", "1", "-y"])
            .args(["-pix_fmt", if want_alpha { "rgba" } else { "rgb24" }])
            .arg(scratch)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // The exit status is not authoritative here: a seek past the last
        // decodable frame exits nonzero without meaning "broken file". The
        // presence of the output file is the real signal.
        self.run("ffmpeg", &mut command)?;
        Ok(scratch.exists())
    }

    fn encode_thumbnail(
        &self,
        scratch: &Path,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ThumbqError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-hide_banner", "-loglevel", "quiet", "-threads", "1"])
            .arg("-i")
            .arg(scratch)
            .arg("-vf")
            .arg(format!("scale={width}x{height}"))
            .args(["-frames:v", "1", "-update", "1", "-f", "mjpeg", "pipe:1"])
            .stderr(Stdio::null());

        let output = self.run("ffmpeg", &mut command)?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(ThumbqError::ToolFailed {
                tool: "ffmpeg",
                context: format!("encoding {width}x{height} thumbnail"),
            });
        }
        Ok(output.stdout)
    }

    fn convert_picture(&self, url: &str, want_alpha: bool) -> Result<Vec<u8>, ThumbqError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-hide_banner", "-loglevel", "quiet", "-threads", "1"])
            .args(["-i", url])
            .args(["-frames:v", "1", "-update", "1", "-c:v", "png"])
            .args(["-pix_fmt", if want_alpha { "rgba" } else { "rgb24" }])
            .args(["-compression_level", "0", "-f", "image2pipe", "-"])
            .stderr(Stdio::null());

        let output = self.run("ffmpeg", &mut command)?;
        if !output.status.success() {
            return Err(ThumbqError::ToolFailed {
                tool: "ffmpeg",
                context: format!("converting {url}"),
            });
        }
        Ok(output.stdout)
    }
}

#[derive(Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Reduce a raw `ffprobe` JSON document to a [`ProbeReport`] for the first
/// video stream.
fn parse_probe_output(raw: &[u8]) -> Result<ProbeReport, ThumbqError> {
    let document: ProbeDocument = serde_json::from_slice(raw)?;

    let video = document
        .streams
        .into_iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .ok_or(ThumbqError::NoVideoStream)?;

    let codec_name = video
        .codec_name
        .ok_or_else(|| ThumbqError::ProbeParse("video stream without codec_name".into()))?;
    let pixel_format = video.pix_fmt.unwrap_or_default();

    // Prefer the stream's own duration; fall back to the container's.
    let duration = video
        .duration
        .or(document.format.and_then(|format| format.duration))
        .and_then(|text| text.parse::<f64>().ok());

    Ok(ProbeReport { codec_name, pixel_format, duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_video_stream() {
        let raw = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264",
                 "pix_fmt": "yuv420p", "duration": "93.5"},
                {"codec_type": "video", "codec_name": "vp9", "pix_fmt": "yuv444p"}
            ],
            "format": {"duration": "94.0"}
        }"#;
        let report = parse_probe_output(raw).unwrap();
        assert_eq!(report.codec_name, "h264");
        assert_eq!(report.pixel_format, "yuv420p");
        assert_eq!(report.duration, Some(93.5));
    }

    #[test]
    fn falls_back_to_container_duration() {
        let raw = br#"{
            "streams": [{"codec_type": "video", "codec_name": "h264", "pix_fmt": "yuv420p"}],
            "format": {"duration": "120.25"}
        }"#;
        let report = parse_probe_output(raw).unwrap();
        assert_eq!(report.duration, Some(120.25));
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let raw = br#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}]}"#;
        assert!(matches!(
            parse_probe_output(raw),
            Err(ThumbqError::NoVideoStream)
        ));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ThumbqError::ProbeParse(_))
        ));
    }

    #[test]
    fn unparseable_duration_becomes_none() {
        let raw = br#"{
            "streams": [{"codec_type": "video", "codec_name": "png",
                         "pix_fmt": "rgba", "duration": "N/A"}]
        }"#;
        let report = parse_probe_output(raw).unwrap();
        assert_eq!(report.duration, None);
    }
}
