//! Single-player tracking by nearest centroid.
//!
//! The tracker keeps one evolving value, the target center, seeded from the
//! user's bounding box. For each sampled frame it asks the detector for
//! players, picks the one whose center is closest to the target center
//! (strict `<`, so the first of equally close candidates wins), emits a
//! record, and moves the target center to the match. Frames without
//! detections emit nothing and leave the center where it was.
//!
//! This is not a multi-object tracker: there is no identity beyond proximity,
//! so two players crossing can swap the target.

use anyhow::Result;
use serde::Serialize;

use crate::config::{AnchorMode, TrackingSettings};
use crate::detect::{BoundingBox, Detection, DetectionOutcome, PlayerDetector, Point};
use crate::frame::Frame;
use crate::ingest::{FileSource, SampledFrames, VideoSource};
use crate::overlay::OverlayFrame;
use crate::scan::{FrameDetections, ScanRun};

/// The detection chosen for one sampled frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackedRecord {
    pub frame_index: u64,
    pub bbox: BoundingBox,
    pub center: Point,
    pub confidence: f32,
}

impl TrackedRecord {
    pub fn new(frame_index: u64, detection: &Detection) -> Self {
        Self {
            frame_index,
            bbox: detection.bbox(),
            center: detection.center(),
            confidence: detection.confidence(),
        }
    }
}

/// Center candidates are measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetReference {
    initial: (f64, f64),
    last_match: (f64, f64),
    anchor: AnchorMode,
}

impl TargetReference {
    pub fn from_bbox(bbox: BoundingBox, anchor: AnchorMode) -> Self {
        let center = bbox.center_f64();
        Self {
            initial: center,
            last_match: center,
            anchor,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        match self.anchor {
            AnchorMode::LastMatch => self.last_match,
            AnchorMode::Initial => self.initial,
        }
    }

    /// Record the detection matched on the current frame.
    pub fn observe(&mut self, detection: &Detection) {
        let center = detection.center();
        self.last_match = (f64::from(center.x), f64::from(center.y));
    }
}

/// Detection closest to `center`. Ties keep the earliest candidate.
pub fn select_nearest(detections: &[Detection], center: (f64, f64)) -> Option<&Detection> {
    let mut best = None;
    let mut min_distance = f64::INFINITY;
    for detection in detections {
        let distance = detection.center().distance_to(center);
        if distance < min_distance {
            min_distance = distance;
            best = Some(detection);
        }
    }
    best
}

/// Counters for one tracking run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrackingStats {
    pub frames_sampled: u64,
    pub frames_matched: u64,
    /// Sampled frames where every detector strategy failed.
    pub detector_failures: u64,
}

/// Result of tracking a whole video.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackingRun {
    pub records: Vec<TrackedRecord>,
    pub stats: TrackingStats,
}

/// Tracking and scanning over one detector.
pub struct PlayerTracker {
    detector: PlayerDetector,
    settings: TrackingSettings,
}

impl PlayerTracker {
    pub fn new(detector: PlayerDetector, settings: TrackingSettings) -> Self {
        Self { detector, settings }
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    /// Player bounding boxes on one frame, for the selection view.
    pub fn bounding_boxes(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self.detector.bounding_boxes(frame)
    }

    /// Track the player selected by `initial_bbox` through the video at `video_path`.
    ///
    /// Fails only when the video cannot be opened.
    pub fn track(
        &mut self,
        video_path: &str,
        initial_bbox: BoundingBox,
        target_fps: u32,
    ) -> Result<TrackingRun> {
        let source = FileSource::open(video_path)?;
        Ok(self.track_source(source, initial_bbox, target_fps))
    }

    pub fn track_source<S: VideoSource>(
        &mut self,
        source: S,
        initial_bbox: BoundingBox,
        target_fps: u32,
    ) -> TrackingRun {
        let mut stream = self.stream(source, initial_bbox, target_fps);
        let records = stream
            .by_ref()
            .filter_map(|overlay| overlay.record)
            .collect();
        let stats = stream.stats();
        log::info!(
            "player tracking complete: {} tracked of {} sampled frames ({} detector failures)",
            stats.frames_matched,
            stats.frames_sampled,
            stats.detector_failures
        );
        TrackingRun { records, stats }
    }

    /// Lazily track, yielding every sampled frame with its optional record.
    pub fn stream<S: VideoSource>(
        &mut self,
        source: S,
        initial_bbox: BoundingBox,
        target_fps: u32,
    ) -> TrackingStream<'_, S> {
        log::info!(
            "tracking player from bbox {:?} at {} fps",
            <[i32; 4]>::from(initial_bbox),
            target_fps
        );
        TrackingStream {
            frames: SampledFrames::new(source, target_fps).with_progress_every(0),
            detector: &mut self.detector,
            target: TargetReference::from_bbox(initial_bbox, self.settings.anchor),
            progress_every: self.settings.progress_every,
            stats: TrackingStats::default(),
        }
    }

    /// Detections on every sampled frame that contains at least one player.
    pub fn scan(&mut self, video_path: &str, target_fps: u32) -> Result<ScanRun> {
        let source = FileSource::open(video_path)?;
        Ok(self.scan_source(source, target_fps))
    }

    pub fn scan_source<S: VideoSource>(&mut self, source: S, target_fps: u32) -> ScanRun {
        let mut run = ScanRun::default();
        let frames = SampledFrames::new(source, target_fps).with_progress_every(0);
        for (frame_index, frame) in frames {
            run.frames_sampled += 1;
            let outcome = self.detector.detect_frame(&frame);
            if outcome.is_unavailable() {
                run.detector_failures += 1;
            }
            let players = outcome.into_detections();
            if !players.is_empty() {
                run.frames.push(FrameDetections {
                    frame_index,
                    players,
                });
            }
            if self.settings.progress_every > 0
                && run.frames_sampled % self.settings.progress_every == 0
            {
                log::info!(
                    "scan: processed {} frames, found {} detection frames",
                    run.frames_sampled,
                    run.frames.len()
                );
            }
        }
        log::info!(
            "video scan complete: {} detection frames of {} sampled",
            run.frames.len(),
            run.frames_sampled
        );
        run
    }
}

/// Lazy tracking over sampled frames.
///
/// Yields frames in increasing index order, which is what a video writer
/// consumes. Dropping the stream releases the video source.
pub struct TrackingStream<'d, S: VideoSource> {
    frames: SampledFrames<S>,
    detector: &'d mut PlayerDetector,
    target: TargetReference,
    progress_every: u64,
    stats: TrackingStats,
}

impl<S: VideoSource> TrackingStream<'_, S> {
    pub fn stats(&self) -> TrackingStats {
        self.stats
    }

    pub fn target(&self) -> TargetReference {
        self.target
    }

    /// Sampled frames the video should produce; zero when its length is unknown.
    pub fn expected_samples(&self) -> u64 {
        self.frames.expected_samples()
    }

    fn step(&mut self, frame_index: u64, frame: &Frame) -> Option<TrackedRecord> {
        let outcome = self.detector.detect_frame(frame);
        if let DetectionOutcome::Unavailable { .. } = outcome {
            self.stats.detector_failures += 1;
        }
        let detections = outcome.into_detections();
        let record = select_nearest(&detections, self.target.center()).map(|best| {
            self.target.observe(best);
            TrackedRecord::new(frame_index, best)
        });
        if record.is_some() {
            self.stats.frames_matched += 1;
        }
        record
    }
}

impl<S: VideoSource> Iterator for TrackingStream<'_, S> {
    type Item = OverlayFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let (frame_index, frame) = self.frames.next()?;
        self.stats.frames_sampled += 1;
        let record = self.step(frame_index, &frame);
        if self.progress_every > 0 && self.stats.frames_sampled % self.progress_every == 0 {
            log::info!(
                "tracking: {} frames, {} detections",
                self.stats.frames_sampled,
                self.stats.frames_matched
            );
        }
        Some(OverlayFrame {
            frame_index,
            frame,
            record,
        })
    }
}
