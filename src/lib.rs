//! Rink tracker
//!
//! Follows one hockey player through a video using a hosted object detector.
//!
//! # Pipeline
//!
//! 1. **Ingest**: open a video, report fps / frame count, decode frames in order.
//! 2. **Sample**: keep every `max(1, floor(source_fps / target_fps))`-th frame.
//! 3. **Detect**: upload each sampled frame to the remote model, falling back
//!    to the workflow endpoint; normalize whatever envelope comes back.
//! 4. **Track**: pick the detection nearest the current target center and move
//!    the center to it.
//! 5. **Overlay**: hand `(frame_index, frame, record)` to a writer in order.
//!
//! # Module Structure
//!
//! - `config`: `RinkConfig` (JSON file + `RINK_*` environment overrides)
//! - `frame`: RGB24 `Frame`
//! - `ingest`: `FileSource`, `SampledFrames`, upload-folder discovery
//! - `detect`: `PlayerDetector`, endpoints, response normalization
//! - `track`: `PlayerTracker`, `TrackedRecord`, nearest-centroid selection
//! - `scan`: per-frame player lists over a whole video
//! - `overlay`: overlay stream, box drawing, JPEG sequence writer

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod scan;
pub mod track;

pub use config::{AnchorMode, DetectorSettings, FallbackSettings, RinkConfig, TrackingSettings};
pub use detect::{
    BoundingBox, Detection, DetectionOutcome, InferenceEndpoint, PlayerDetector, Point,
    StubEndpoint,
};
pub use frame::Frame;
pub use ingest::{
    find_videos, is_video_file, iterate_sampled_frames, skip_factor, FileSource, SampledFrames,
    VideoInfo, VideoSource,
};
pub use overlay::{FrameSink, JpegSequenceSink, OverlayFrame};
pub use scan::{FrameDetections, ScanRun};
pub use track::{
    select_nearest, PlayerTracker, TargetReference, TrackedRecord, TrackingRun, TrackingStats,
    TrackingStream,
};
