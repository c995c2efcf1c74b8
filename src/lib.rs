//! # thumbq
//!
//! On-demand media thumbnail engine: a unique, most-recently-requested-first
//! work queue shared between request-handler producers and a fixed pool of
//! worker threads, with per-key outcome caches and a golden-ratio
//! frame-selection algorithm, driving `ffmpeg`/`ffprobe` as external
//! subprocesses.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thumbq::{EngineConfig, Engine, Outcome};
//!
//! let engine = Engine::start(EngineConfig::new().with_workers(4)).unwrap();
//!
//! // A directory listing discovered these files; queue the ones without a
//! // cached outcome, highest priority first.
//! engine.submit_missing([
//!     "/shows/pilot.mkv".to_string(),
//!     "/shows/poster.png".to_string(),
//! ]);
//!
//! // Later, serve whatever is ready. A missing entry means "not ready yet".
//! match engine.outcome("/shows/pilot.mkv") {
//!     Some(Outcome::Ready(thumbnail)) => println!("{} bytes", thumbnail.bytes.len()),
//!     Some(Outcome::Failed) => println!("no thumbnail available"),
//!     None => println!("still generating"),
//! }
//!
//! engine.shutdown();
//! ```
//!
//! ## How it works
//!
//! - **Queue** — [`WorkQueue`] holds at most one pending entry per key and
//!   serves the most recently submitted key first, so the directory being
//!   browsed right now wins. A key being processed is marked in-flight and
//!   duplicate submissions are suppressed ([`WorkQueue::submit_batch`]).
//! - **Selection** — [`selector`] probes each file once, then searches for a
//!   decodable frame starting at `duration × (3 − √5)/2` with geometric
//!   backoff and a first-frame fallback.
//! - **Pipeline** — [`pipeline`] caps output size under a pixel budget
//!   (short side a multiple of 16 for the encoder), composites transparent
//!   still images onto white, and delegates decode/encode to the external
//!   tool behind the [`MediaTool`] trait.
//! - **Caches** — [`ResultCache`] maps `sha256(secret ‖ path)` keys to
//!   outcomes; failures are permanent for the process lifetime.
//!   [`ConversionCache`] lazily memoizes full-resolution picture
//!   conversions.
//! - **Workers** — a fixed pool drains the queue until
//!   [`Engine::shutdown`] closes it and joins the threads.
//!
//! ## Requirements
//!
//! The `ffmpeg` and `ffprobe` binaries must be available on `PATH` (or
//! configured via [`EngineConfig::with_ffmpeg`] /
//! [`EngineConfig::with_ffprobe`]). The crate never links against FFmpeg.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod pipeline;
pub mod queue;
pub mod selector;
mod worker;

pub use cache::{CacheKey, Converted, ConversionCache, KeyDeriver, Outcome, ResultCache, Thumbnail};
pub use config::{DEFAULT_PIXEL_BUDGET, DEFAULT_WORKERS, EngineConfig};
pub use engine::Engine;
pub use error::ThumbqError;
pub use ffmpeg::{FfmpegTool, MediaTool, ProbeReport};
pub use pipeline::{ThumbnailPipeline, composite_over_white, fit_pixel_budget};
pub use queue::WorkQueue;
pub use selector::{FrameSelector, SEEK_RATIO, StreamInfo};
