use anyhow::Result;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rink_tracker::detect::{parse_response, StubReply};
use rink_tracker::overlay::render;
use rink_tracker::{
    iterate_sampled_frames, AnchorMode, BoundingBox, FileSource, Frame, JpegSequenceSink,
    PlayerDetector, PlayerTracker, Point, StubEndpoint, TrackingSettings, VideoInfo,
    VideoSource,
};

fn classes() -> Vec<String> {
    vec!["player".to_string(), "person".to_string()]
}

fn player(x: i32, y: i32) -> Value {
    json!({"class": "player", "x": x, "y": y, "width": 10, "height": 20, "confidence": 0.9})
}

fn players(centers: &[(i32, i32)]) -> Value {
    let items: Vec<Value> = centers.iter().map(|&(x, y)| player(x, y)).collect();
    json!({ "predictions": items })
}

fn settings(anchor: AnchorMode) -> TrackingSettings {
    TrackingSettings {
        anchor,
        ..TrackingSettings::default()
    }
}

fn tracker_with(endpoint: StubEndpoint, anchor: AnchorMode) -> PlayerTracker {
    let detector = PlayerDetector::new(Box::new(endpoint), classes());
    PlayerTracker::new(detector, settings(anchor))
}

/// Synthetic source that reports when it is dropped.
struct WatchedSource {
    inner: FileSource,
    dropped: Arc<AtomicBool>,
}

impl VideoSource for WatchedSource {
    fn info(&self) -> VideoInfo {
        self.inner.info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner.next_frame()
    }
}

impl Drop for WatchedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn full_rate_sampling_keeps_every_frame() -> Result<()> {
    let frames = iterate_sampled_frames("stub://clip?fps=30&frames=900&width=8&height=8", 30)?;
    assert_eq!((&frames).skip(), 1);
    let indices: Vec<u64> = frames.map(|(index, _)| index).collect();
    assert_eq!(indices.len(), 900);
    assert_eq!(indices.first(), Some(&1));
    assert_eq!(indices.last(), Some(&900));
    Ok(())
}

#[test]
fn downsampling_keeps_every_third_frame() -> Result<()> {
    let frames = iterate_sampled_frames("stub://clip?fps=30&frames=900&width=8&height=8", 10)?;
    assert_eq!((&frames).skip(), 3);
    let indices: Vec<u64> = frames.map(|(index, _)| index).collect();
    assert_eq!(indices.len(), 300);
    assert!(indices.iter().zip(1..).all(|(&index, n)| index == 3 * n));
    Ok(())
}

#[test]
fn unopenable_videos_fail_up_front() {
    assert!(iterate_sampled_frames("https://example.com/game.mp4", 10).is_err());
    assert!(iterate_sampled_frames("/definitely/not/here.mp4", 10).is_err());
}

#[test]
fn center_coordinates_become_top_left_boxes() {
    let response = json!({
        "predictions": [
            {"class": "player", "x": 50, "y": 60, "width": 20, "height": 40, "confidence": 0.9}
        ]
    });
    let parsed = parse_response(&response, &classes()).expect("usable response");
    assert_eq!(parsed.detections.len(), 1);
    let detection = parsed.detections[0];
    assert_eq!(detection.bbox(), BoundingBox::new(40, 40, 20, 40));
    assert_eq!(detection.center(), Point { x: 50, y: 60 });
    assert_eq!(detection.confidence(), 0.9);
}

#[test]
fn unavailable_detector_yields_no_records_and_releases_video() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .otherwise(StubReply::Failure("connection refused".to_string()));
    let calls = endpoint.calls();
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let dropped = Arc::new(AtomicBool::new(false));
    let source = WatchedSource {
        inner: FileSource::open("stub://clip?fps=30&frames=30&width=8&height=8")?,
        dropped: dropped.clone(),
    };
    let run = tracker.track_source(source, BoundingBox::new(0, 0, 4, 4), 10);

    assert!(run.records.is_empty());
    assert_eq!(run.stats.frames_sampled, 10);
    assert_eq!(run.stats.frames_matched, 0);
    assert_eq!(run.stats.detector_failures, 10);
    assert_eq!(calls.len(), 10);
    assert!(dropped.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn target_follows_the_nearest_player() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .reply(players(&[(12, 10), (100, 100)]))
        .reply(players(&[(100, 100), (40, 10)]))
        .reply(players(&[(70, 10), (-20, 10)]));
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let run = tracker.track(
        "stub://clip?fps=30&frames=3&width=8&height=8",
        BoundingBox::new(0, 0, 20, 20),
        30,
    )?;

    let centers: Vec<Point> = run.records.iter().map(|record| record.center).collect();
    assert_eq!(
        centers,
        vec![
            Point { x: 12, y: 10 },
            Point { x: 40, y: 10 },
            Point { x: 70, y: 10 }
        ]
    );
    let indices: Vec<u64> = run.records.iter().map(|record| record.frame_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(run.records[1].bbox, BoundingBox::new(35, 0, 10, 20));
    assert_eq!(run.stats.frames_matched, 3);
    assert_eq!(run.stats.detector_failures, 0);
    Ok(())
}

#[test]
fn initial_anchor_ignores_previous_matches() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .reply(players(&[(12, 10), (100, 100)]))
        .reply(players(&[(100, 100), (40, 10)]))
        .reply(players(&[(70, 10), (-20, 10)]));
    let mut tracker = tracker_with(endpoint, AnchorMode::Initial);

    let run = tracker.track(
        "stub://clip?fps=30&frames=3&width=8&height=8",
        BoundingBox::new(0, 0, 20, 20),
        30,
    )?;

    let last = run.records.last().expect("third frame matched");
    assert_eq!(last.center, Point { x: -20, y: 10 });
    Ok(())
}

#[test]
fn empty_frames_emit_nothing_and_keep_the_target() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .reply(players(&[(12, 10)]))
        .reply(json!({"predictions": []}))
        .reply(json!({"predictions": [{"class": "referee", "x": 13, "y": 10}]}))
        .reply(players(&[(30, 10), (-5, 10)]));
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let source = FileSource::open("stub://clip?fps=30&frames=4&width=8&height=8")?;
    let mut stream = tracker.stream(source, BoundingBox::new(0, 0, 20, 20), 30);

    let first = stream.next().expect("frame 1");
    assert_eq!(first.frame_index, 1);
    assert!(first.record.is_some());
    assert_eq!(stream.target().center(), (12.0, 10.0));

    for expected_index in [2, 3] {
        let overlay = stream.next().expect("empty frame");
        assert_eq!(overlay.frame_index, expected_index);
        assert!(overlay.record.is_none());
        assert_eq!(stream.target().center(), (12.0, 10.0));
    }

    let fourth = stream.next().expect("frame 4");
    let record = fourth.record.expect("frame 4 matched");
    assert_eq!(record.center, Point { x: -5, y: 10 });
    assert!(stream.next().is_none());

    let stats = stream.stats();
    assert_eq!(stats.frames_sampled, 4);
    assert_eq!(stats.frames_matched, 2);
    assert_eq!(stats.detector_failures, 0);
    Ok(())
}

#[test]
fn failed_frames_do_not_end_tracking() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .fail("503 service unavailable")
        .reply(players(&[(12, 10)]));
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let run = tracker.track(
        "stub://clip?fps=30&frames=2&width=8&height=8",
        BoundingBox::new(0, 0, 20, 20),
        30,
    )?;
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].frame_index, 2);
    assert_eq!(run.stats.detector_failures, 1);
    Ok(())
}

#[test]
fn absurd_coordinates_neither_panic_nor_win_selection() -> Result<()> {
    let endpoint = StubEndpoint::new().reply(json!({"predictions": [
        {"class": "player", "x": 3e9, "y": 10, "width": 3e9, "height": 10, "confidence": 0.9},
        player(40, 10),
    ]}));
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let run = tracker.track(
        "stub://clip?fps=30&frames=1&width=8&height=8",
        BoundingBox::new(0, 0, 20, 20),
        30,
    )?;
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].center, Point { x: 40, y: 10 });
    Ok(())
}

#[test]
fn fallback_endpoint_rescues_primary_failures() -> Result<()> {
    let primary = StubEndpoint::new()
        .otherwise(StubReply::Failure("403 forbidden".to_string()));
    let fallback = StubEndpoint::new()
        .otherwise(StubReply::Response(json!({"output": [player(12, 10)]})));
    let fallback_calls = fallback.calls();
    let detector =
        PlayerDetector::new(Box::new(primary), classes()).with_fallback(Box::new(fallback));
    let mut tracker = PlayerTracker::new(detector, settings(AnchorMode::LastMatch));

    let run = tracker.track(
        "stub://clip?fps=30&frames=6&width=8&height=8",
        BoundingBox::new(0, 0, 20, 20),
        10,
    )?;
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.stats.detector_failures, 0);
    assert_eq!(fallback_calls.len(), 2);
    Ok(())
}

#[test]
fn scan_keeps_frames_with_players() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .reply(players(&[(12, 10), (30, 30)]))
        .reply(json!({"predictions": []}))
        .fail("timeout");
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let run = tracker.scan("stub://clip?fps=30&frames=9&width=8&height=8", 10)?;
    assert_eq!(run.frames_sampled, 3);
    assert_eq!(run.detector_failures, 1);
    assert_eq!(run.frames.len(), 1);
    assert_eq!(run.frames[0].frame_index, 3);
    assert_eq!(run.total_players(), 2);
    Ok(())
}

#[test]
fn overlay_stream_renders_every_sampled_frame() -> Result<()> {
    let endpoint = StubEndpoint::new()
        .reply(players(&[(4, 4)]))
        .reply(json!({"predictions": []}));
    let mut tracker = tracker_with(endpoint, AnchorMode::LastMatch);

    let dir = tempfile::tempdir()?;
    let mut sink = JpegSequenceSink::create(dir.path())?;
    let source = FileSource::open("stub://clip?fps=30&frames=6&width=8&height=8")?;
    let stream = tracker.stream(source, BoundingBox::new(0, 0, 8, 8), 10);
    assert_eq!(stream.expected_samples(), 2);
    let written = render(stream, &mut sink)?;

    assert_eq!(written, 2);
    assert!(sink.frame_path(3).is_file());
    assert!(sink.frame_path(6).is_file());
    assert!(!sink.frame_path(1).exists());
    Ok(())
}
