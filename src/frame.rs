//! Decoded video frames.
//!
//! - `Frame`: RGB24 raster produced by a `VideoSource`. The source owns the frame
//!   during iteration; detectors borrow it read-only.
//!
//! Frames are never persisted by this crate except through the scoped temporary
//! JPEG the detector client uploads, and through an explicit `FrameSink`.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::io::Write;
use std::path::Path;

/// Channels per pixel. Frames are always packed RGB24.
pub const CHANNELS: usize = 3;

/// JPEG quality used when frames are serialized for upload or export.
pub const JPEG_QUALITY: u8 = 90;

/// Decoded RGB24 frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap packed RGB24 pixels. The buffer must be exactly `width * height * 3` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{} frame, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = expected_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..(len / CHANNELS) {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    /// Load any image the `image` crate can decode (JPEG in the default build).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Encode as JPEG into any writer.
    pub fn write_jpeg<W: Write>(&self, writer: W) -> Result<()> {
        let mut encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
        encoder
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode frame as jpeg")
    }

    pub fn to_jpeg_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_jpeg(&mut bytes)?;
        Ok(bytes)
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
