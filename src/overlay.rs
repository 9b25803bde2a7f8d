//! Overlay stream toward the video writer.
//!
//! The writer receives `(frame_index, frame, optional record)` in increasing
//! frame-index order. `draw_bbox` outlines the tracked player directly in the
//! RGB buffer; `JpegSequenceSink` is the built-in writer and stores one JPEG
//! per sampled frame.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::detect::BoundingBox;
use crate::frame::{Frame, CHANNELS};
use crate::track::TrackedRecord;

pub const HIGHLIGHT: [u8; 3] = [255, 215, 0];
pub const DEFAULT_THICKNESS: u32 = 3;

/// One sampled frame plus the record tracked on it, if any.
#[derive(Clone, Debug)]
pub struct OverlayFrame {
    pub frame_index: u64,
    pub frame: Frame,
    pub record: Option<TrackedRecord>,
}

impl OverlayFrame {
    /// Draw the tracked box, if there is one.
    pub fn annotate(&mut self) {
        if let Some(record) = self.record {
            draw_bbox(&mut self.frame, record.bbox, HIGHLIGHT, DEFAULT_THICKNESS);
        }
    }
}

/// Outline `bbox` on `frame`. Parts outside the frame are clipped.
pub fn draw_bbox(frame: &mut Frame, bbox: BoundingBox, color: [u8; 3], thickness: u32) {
    if bbox.w == 0 || bbox.h == 0 || thickness == 0 {
        return;
    }
    let width = i64::from(frame.width);
    let height = i64::from(frame.height);
    let x0 = i64::from(bbox.x);
    let y0 = i64::from(bbox.y);
    let x1 = x0 + i64::from(bbox.w) - 1;
    let y1 = y0 + i64::from(bbox.h) - 1;
    let t = i64::from(thickness);

    let pixels = frame.pixels_mut();
    for y in y0.max(0)..=y1.min(height - 1) {
        for x in x0.max(0)..=x1.min(width - 1) {
            let on_edge = x < x0 + t || x > x1 - t || y < y0 + t || y > y1 - t;
            if on_edge {
                let offset = ((y * width + x) as usize) * CHANNELS;
                pixels[offset..offset + CHANNELS].copy_from_slice(&color);
            }
        }
    }
}

/// Consumer of the overlay stream.
pub trait FrameSink {
    fn write(&mut self, overlay: &OverlayFrame) -> Result<()>;

    /// Flush and return the number of frames written.
    fn finish(&mut self) -> Result<u64>;
}

/// Writes `frame_000001.jpg`, `frame_000003.jpg`, ... into a directory.
pub struct JpegSequenceSink {
    dir: PathBuf,
    last_index: Option<u64>,
    written: u64,
}

impl JpegSequenceSink {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            last_index: None,
            written: 0,
        })
    }

    pub fn frame_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.jpg", frame_index))
    }
}

impl FrameSink for JpegSequenceSink {
    fn write(&mut self, overlay: &OverlayFrame) -> Result<()> {
        if let Some(last) = self.last_index {
            if overlay.frame_index <= last {
                return Err(anyhow!(
                    "frame {} arrived after frame {}; overlay frames must be increasing",
                    overlay.frame_index,
                    last
                ));
            }
        }
        let path = self.frame_path(overlay.frame_index);
        let file =
            File::create(&path).with_context(|| format!("create {}", path.display()))?;
        if overlay.record.is_some() {
            let mut annotated = overlay.clone();
            annotated.annotate();
            annotated.frame.write_jpeg(BufWriter::new(file))?;
        } else {
            overlay.frame.write_jpeg(BufWriter::new(file))?;
        }
        self.last_index = Some(overlay.frame_index);
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<u64> {
        log::info!(
            "wrote {} overlay frames to {}",
            self.written,
            self.dir.display()
        );
        Ok(self.written)
    }
}

/// Drain an overlay stream into `sink`.
pub fn render<I>(frames: I, sink: &mut dyn FrameSink) -> Result<u64>
where
    I: IntoIterator<Item = OverlayFrame>,
{
    for overlay in frames {
        sink.write(&overlay)?;
    }
    sink.finish()
}
