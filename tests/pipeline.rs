//! End-to-end pipeline tests over a scripted media tool.

mod common;

use std::sync::Arc;

use common::{FAKE_JPEG, ScriptedTool};
use tempfile::NamedTempFile;
use thumbq::{EngineConfig, MediaTool, ThumbnailPipeline, ThumbqError};

fn scratch() -> NamedTempFile {
    NamedTempFile::with_suffix(".png").expect("failed to create scratch file")
}

fn pipeline(tool: ScriptedTool) -> (Arc<ScriptedTool>, ThumbnailPipeline) {
    let tool = Arc::new(tool);
    let config = Arc::new(EngineConfig::new());
    let pipeline = ThumbnailPipeline::new(Arc::clone(&tool) as Arc<dyn MediaTool>, config);
    (tool, pipeline)
}

#[test]
fn oversized_frames_are_encoded_under_the_pixel_budget() {
    let (tool, pipeline) = pipeline(ScriptedTool::video(100.0).frame_size(1920, 1080));
    let scratch = scratch();

    let thumbnail = pipeline
        .generate("/film.mkv", scratch.path())
        .expect("generation should succeed");

    assert_eq!(thumbnail.bytes, FAKE_JPEG);
    assert_eq!(thumbnail.codec_name, "h264");
    assert_eq!(thumbnail.duration, Some(100.0));
    assert!(!thumbnail.is_still_image);

    let calls = tool.calls.lock().unwrap();
    // 1920x1080 against a 100 000 pixel budget: short side floored to 224.
    assert_eq!(calls.encodes.as_slice(), &[(398, 224)]);
}

#[test]
fn frames_within_the_budget_keep_their_dimensions() {
    let (tool, pipeline) = pipeline(ScriptedTool::video(10.0));
    let scratch = scratch();

    pipeline
        .generate("/clip.mkv", scratch.path())
        .expect("generation should succeed");

    let calls = tool.calls.lock().unwrap();
    assert_eq!(calls.encodes.as_slice(), &[(64, 48)]);
}

#[test]
fn transparent_stills_are_composited_onto_white_before_encoding() {
    let (tool, pipeline) =
        pipeline(ScriptedTool::still_png().frame_pixel([100, 100, 100, 128]));
    let scratch = scratch();

    let thumbnail = pipeline
        .generate("/poster.png", scratch.path())
        .expect("generation should succeed");
    assert!(thumbnail.is_still_image);
    assert_eq!(thumbnail.duration, None);

    {
        let calls = tool.calls.lock().unwrap();
        assert_eq!(
            calls.snapshots.as_slice(),
            &[(None, true)],
            "transparent stills are captured with alpha and no seek"
        );
    }

    // The scratch frame handed to the encoder must already be opaque.
    let composited = image::open(scratch.path())
        .expect("scratch frame should be readable")
        .into_rgb8();
    assert_eq!(composited.get_pixel(0, 0).0, [177, 177, 177]);
}

#[test]
fn opaque_videos_skip_compositing() {
    let (tool, pipeline) = pipeline(ScriptedTool::video(100.0));
    let scratch = scratch();

    pipeline
        .generate("/film.mkv", scratch.path())
        .expect("generation should succeed");

    let calls = tool.calls.lock().unwrap();
    assert!(
        calls.snapshots.iter().all(|(_, want_alpha)| !want_alpha),
        "video snapshots must not request an alpha channel"
    );
}

#[test]
fn files_without_video_streams_fail() {
    let (tool, pipeline) = pipeline(ScriptedTool::no_video());
    let scratch = scratch();

    let error = pipeline
        .generate("/audio.flac", scratch.path())
        .expect_err("no video stream to thumbnail");
    assert!(matches!(error, ThumbqError::NoVideoStream));

    let calls = tool.calls.lock().unwrap();
    assert!(calls.snapshots.is_empty(), "failed probes must not snapshot");
    assert!(calls.encodes.is_empty());
}
