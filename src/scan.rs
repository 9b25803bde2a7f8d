//! Whole-video player scans.

use serde::Serialize;

use crate::detect::Detection;

/// Players detected on one sampled frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameDetections {
    pub frame_index: u64,
    pub players: Vec<Detection>,
}

/// Result of `PlayerTracker::scan`. Only frames with players are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScanRun {
    pub frames: Vec<FrameDetections>,
    pub frames_sampled: u64,
    pub detector_failures: u64,
}

impl ScanRun {
    pub fn total_players(&self) -> usize {
        self.frames.iter().map(|frame| frame.players.len()).sum()
    }
}
