//! Error types for the `thumbq` crate.
//!
//! This module defines [`ThumbqError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context to diagnose
//! a failed tool invocation without extra logging at the call site.
//!
//! Note that a failed thumbnail generation is *not* surfaced to readers as an
//! error: the worker records it as [`Outcome::Failed`](crate::Outcome) and the
//! key is served as "no thumbnail available" from then on.

use std::io::Error as IoError;

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `thumbq` operations.
///
/// Every public method that can fail returns `Result<T, ThumbqError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThumbqError {
    /// The external tool binary could not be started at all.
    #[error("Failed to start {tool}: {reason}")]
    ToolStart {
        /// Name of the binary (`ffmpeg` or `ffprobe`).
        tool: &'static str,
        /// Underlying reason the spawn failed.
        reason: String,
    },

    /// The external tool ran but reported failure where its exit status is
    /// authoritative (probing, resizing, picture conversion).
    #[error("{tool} exited with failure: {context}")]
    ToolFailed {
        /// Name of the binary that failed.
        tool: &'static str,
        /// What the tool was asked to do.
        context: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The probe output could not be parsed as the expected JSON document.
    #[error("Failed to parse probe output: {0}")]
    ProbeParse(String),

    /// No decodable frame was found at any candidate timestamp, including
    /// the final no-seek fallback.
    #[error("No frame could be extracted from the stream")]
    SnapshotFailed,

    /// The configured index base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// An I/O error occurred while reading or writing scratch files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while reading a scratch frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<serde_json::Error> for ThumbqError {
    fn from(error: serde_json::Error) -> Self {
        ThumbqError::ProbeParse(error.to_string())
    }
}
