//! Frame sampling down to a target processing rate.
//!
//! Every frame is decoded; only 1-based indices that are a multiple of the
//! skip factor are yielded. Decode-skipping would be cheaper but is not
//! available through the sequential `VideoSource` interface.

use super::{VideoInfo, VideoSource};
use crate::frame::Frame;

/// Processed frames between progress log lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 10;

/// `max(1, floor(source_fps / target_fps))`.
///
/// A zero target rate or an unknown source rate samples every frame.
pub fn skip_factor(source_fps: f64, target_fps: u32) -> u64 {
    if target_fps == 0 || !source_fps.is_finite() || source_fps <= 0.0 {
        return 1;
    }
    ((source_fps / f64::from(target_fps)).floor() as u64).max(1)
}

/// Lazy `(frame_index, frame)` sequence over a `VideoSource`.
///
/// Dropping the iterator drops the source, which releases the decoder.
pub struct SampledFrames<S: VideoSource> {
    source: S,
    info: VideoInfo,
    skip: u64,
    frames_read: u64,
    yielded: u64,
    progress_every: u64,
    finished: bool,
}

impl<S: VideoSource> SampledFrames<S> {
    pub fn new(source: S, target_fps: u32) -> Self {
        let info = source.info();
        let skip = skip_factor(info.fps, target_fps);
        log::info!(
            "sampling video: {:.1} fps, {} frames, processing every {} frame(s)",
            info.fps,
            info.total_frames,
            skip
        );
        Self {
            source,
            info,
            skip,
            frames_read: 0,
            yielded: 0,
            progress_every: DEFAULT_PROGRESS_EVERY,
            finished: false,
        }
    }

    /// Override the progress log interval. Zero disables progress lines.
    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Frames decoded so far, including discarded ones.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Expected number of sampled frames, when the container reports a count.
    pub fn expected_samples(&self) -> u64 {
        self.info.total_frames / self.skip
    }
}

impl<S: VideoSource> Iterator for SampledFrames<S> {
    type Item = (u64, Frame);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(err) => {
                    log::warn!(
                        "decode failed after frame {}; ending video early: {:#}",
                        self.frames_read,
                        err
                    );
                    self.finished = true;
                    break;
                }
            };

            self.frames_read += 1;
            if self.frames_read % self.skip != 0 {
                continue;
            }

            self.yielded += 1;
            if self.progress_every > 0 && self.yielded % self.progress_every == 0 {
                log::info!(
                    "processed {} sampled frames ({} decoded)",
                    self.yielded,
                    self.frames_read
                );
            }
            return Some((self.frames_read, frame));
        }
        None
    }
}
