//! Video ingestion.
//!
//! This module provides the frame pipeline feeding detection:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` videos (testing)
//! - Frame sampling down to a target processing rate
//! - Upload-folder discovery by container extension
//!
//! All sources produce `Frame` instances in decode order. The ingestion layer is
//! responsible for:
//! - Reporting the true source frame rate and frame count
//! - Ending iteration cleanly at end-of-stream
//! - Releasing the decoder on drop, including early exit

mod discover;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod sampler;

use anyhow::Result;

use crate::frame::Frame;

pub use discover::{find_videos, is_video_file, VIDEO_EXTENSIONS};
pub use file::FileSource;
pub use sampler::{skip_factor, SampledFrames};

/// Stream properties reported when a video is opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    /// Total frames as reported by the container. Zero when unknown.
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
}

/// A sequential frame source.
pub trait VideoSource {
    fn info(&self) -> VideoInfo;

    /// Decode the next frame. `Ok(None)` marks end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn info(&self) -> VideoInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// Open `path` and sample it down to `target_fps`.
///
/// Fails only when the video cannot be opened at all.
pub fn iterate_sampled_frames(path: &str, target_fps: u32) -> Result<SampledFrames<FileSource>> {
    let source = FileSource::open(path)?;
    Ok(SampledFrames::new(source, target_fps))
}
