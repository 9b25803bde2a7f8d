//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file. The file source is
//! responsible for:
//! - Opening the container and reporting fps / frame count up front
//! - Decoding frames in-memory, in order, as RGB24
//! - Closing the decoder when dropped
//!
//! The file source MUST NOT:
//! - Fetch remote URLs
//! - Store decoded frames to disk

use anyhow::{anyhow, Context, Result};
use url::Url;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{VideoInfo, VideoSource};
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";
const DEFAULT_STUB_FPS: f64 = 30.0;
const DEFAULT_STUB_FRAMES: u64 = 300;
const DEFAULT_STUB_WIDTH: u32 = 64;
const DEFAULT_STUB_HEIGHT: u32 = 48;

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a local video. `stub://` paths produce a synthetic clip:
    /// `stub://name?fps=30&frames=900&width=64&height=48`.
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = if path.starts_with(STUB_SCHEME) {
            FileBackend::Synthetic(SyntheticFileSource::parse(path)?)
        } else {
            open_decoder(path)?
        };
        let source = Self {
            path: path.to_string(),
            backend,
        };
        let info = source.info();
        log::info!(
            "FileSource: opened {} ({:.1} fps, {} frames, {}x{})",
            source.path,
            info.fps,
            info.total_frames,
            info.width,
            info.height
        );
        Ok(source)
    }

    /// Frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.emitted,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frames_read(),
        }
    }
}

impl VideoSource for FileSource {
    fn info(&self) -> VideoInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        log::debug!(
            "FileSource: released {} after {} frames",
            self.path,
            self.frames_read()
        );
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_decoder(path: &str) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_decoder(path: &str) -> Result<FileBackend> {
    Err(anyhow!(
        "cannot open {}: this build has no video decoder; \
         rebuild with `cargo build --features ingest-file-ffmpeg` (needs the FFmpeg libraries)",
        path
    ))
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    info: VideoInfo,
    emitted: u64,
}

impl SyntheticFileSource {
    fn parse(path: &str) -> Result<Self> {
        let url = Url::parse(path).with_context(|| format!("parse stub video url '{}'", path))?;
        let mut info = VideoInfo {
            fps: DEFAULT_STUB_FPS,
            total_frames: DEFAULT_STUB_FRAMES,
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "fps" => info.fps = parse_param(&key, &value)?,
                "frames" => info.total_frames = parse_param(&key, &value)?,
                "width" => info.width = parse_param(&key, &value)?,
                "height" => info.height = parse_param(&key, &value)?,
                other => return Err(anyhow!("unknown stub video parameter '{}'", other)),
            }
        }
        if info.fps.is_nan() || info.fps <= 0.0 {
            return Err(anyhow!("stub video fps must be positive"));
        }
        if info.width == 0 || info.height == 0 {
            return Err(anyhow!("stub video dimensions must be non-zero"));
        }
        Ok(Self { info, emitted: 0 })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.emitted >= self.info.total_frames {
            return Ok(None);
        }
        self.emitted += 1;
        let shade = (self.emitted % 256) as u8;
        Frame::filled(
            self.info.width,
            self.info.height,
            [shade, 128, 255 - shade],
        )
        .map(Some)
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid stub video parameter {}={}", key, value))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_source_reports_parameters_and_ends() -> Result<()> {
        let mut source = FileSource::open("stub://clip?fps=25&frames=3&width=8&height=4")?;
        let info = source.info();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.total_frames, 3);

        let mut count = 0;
        while let Some(frame) = source.next_frame()? {
            assert_eq!((frame.width, frame.height), (8, 4));
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_remote_urls() {
        assert!(FileSource::open("rtsp://camera/stream").is_err());
        assert!(FileSource::open("   ").is_err());
    }

    #[test]
    fn rejects_unknown_stub_parameters() {
        assert!(FileSource::open("stub://clip?speed=2").is_err());
        assert!(FileSource::open("stub://clip?fps=0").is_err());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn decoderless_build_names_the_missing_feature() {
        match FileSource::open("game.mp4") {
            Ok(_) => panic!("real files need a decoder"),
            Err(err) => {
                let message = err.to_string();
                assert!(message.contains("game.mp4"));
                assert!(message.contains("--features ingest-file-ffmpeg"));
            }
        }
    }
}
