//! rink - track a hockey player through a video with a hosted detector
//!
//! Subcommands print JSON on stdout; logs and progress go to stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use rink_tracker::overlay::{FrameSink, JpegSequenceSink};
use rink_tracker::{
    find_videos, AnchorMode, BoundingBox, FileSource, Frame, PlayerDetector,
    PlayerTracker, RinkConfig, TrackingRun, VideoSource,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hockey player tracking over a hosted object detector")]
struct Args {
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE", global = true)]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track the player inside --bbox through the video
    Track {
        /// Video file (needs a build with --features ingest-file-ffmpeg) or a stub:// clip
        #[arg(long)]
        video: String,
        /// Initial selection as x,y,w,h (pixels, top-left origin)
        #[arg(long, value_parser = parse_bbox)]
        bbox: BoundingBox,
        /// Sampling rate; defaults to the configured target fps
        #[arg(long)]
        target_fps: Option<u32>,
        /// Anchor mode (last_match|initial); defaults to the configured mode
        #[arg(long)]
        anchor: Option<String>,
        /// Write one JPEG per sampled frame, tracked box drawn, into this directory
        #[arg(long)]
        render_dir: Option<PathBuf>,
        /// Write the JSON result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Player bounding boxes on one image, or on the first frame of --video
    Boxes {
        #[arg(long, conflicts_with = "video", required_unless_present = "video")]
        image: Option<PathBuf>,
        #[arg(long)]
        video: Option<String>,
    },

    /// Players on every sampled frame of the video
    Scan {
        #[arg(long)]
        video: String,
        #[arg(long)]
        target_fps: Option<u32>,
    },

    /// Video files in an upload directory
    List {
        #[arg(long, default_value = "uploads")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    match args.command {
        Command::List { dir } => {
            let videos = find_videos(&dir)?;
            print_json(&videos, None)
        }
        Command::Boxes { image, video } => {
            let cfg = RinkConfig::load()?;
            let frame = {
                let _stage = ui.stage("Loading frame");
                match (image, video) {
                    (Some(image), _) => Frame::open(image)?,
                    (None, Some(video)) => first_frame(&video)?,
                    (None, None) => return Err(anyhow!("--image or --video is required")),
                }
            };
            let mut detector = PlayerDetector::from_settings(&cfg.detector)?;
            let boxes = {
                let _stage = ui.stage("Detecting players");
                detector.bounding_boxes(&frame)
            };
            print_json(&boxes, None)
        }
        Command::Scan { video, target_fps } => {
            let cfg = RinkConfig::load()?;
            let target_fps = target_fps.unwrap_or(cfg.tracking.target_fps);
            let detector = PlayerDetector::from_settings(&cfg.detector)?;
            let mut tracker = PlayerTracker::new(detector, cfg.tracking.clone());
            let run = {
                let _stage = ui.stage("Scanning video");
                tracker.scan(&video, target_fps)?
            };
            print_json(&run, None)
        }
        Command::Track {
            video,
            bbox,
            target_fps,
            anchor,
            render_dir,
            output,
        } => {
            let mut cfg = RinkConfig::load()?;
            if let Some(anchor) = anchor.as_deref() {
                cfg.tracking.anchor = AnchorMode::parse(anchor)?;
            }
            let target_fps = target_fps.unwrap_or(cfg.tracking.target_fps);
            if target_fps == 0 {
                return Err(anyhow!("--target-fps must be >= 1"));
            }
            let detector = PlayerDetector::from_settings(&cfg.detector)?;
            let mut tracker = PlayerTracker::new(detector, cfg.tracking.clone());
            let run = track(&ui, &mut tracker, &video, bbox, target_fps, render_dir)?;
            print_json(&run, output)
        }
    }
}

fn track(
    ui: &ui::Ui,
    tracker: &mut PlayerTracker,
    video: &str,
    bbox: BoundingBox,
    target_fps: u32,
    render_dir: Option<PathBuf>,
) -> Result<TrackingRun> {
    let source = FileSource::open(video)?;
    let mut sink = match render_dir {
        Some(dir) => Some(JpegSequenceSink::create(dir)?),
        None => None,
    };

    let _stage = ui.stage("Tracking player");
    let mut stream = tracker.stream(source, bbox, target_fps);
    let progress = ui.frames("tracking", stream.expected_samples());
    let mut records = Vec::new();
    for overlay in stream.by_ref() {
        if let Some(sink) = sink.as_mut() {
            sink.write(&overlay)?;
        }
        if let Some(record) = overlay.record {
            records.push(record);
        }
        progress.advance(records.len() as u64);
    }
    let stats = stream.stats();
    if let Some(sink) = sink.as_mut() {
        sink.finish()?;
    }
    log::info!(
        "tracked {} of {} sampled frames ({} detector failures)",
        stats.frames_matched,
        stats.frames_sampled,
        stats.detector_failures
    );
    Ok(TrackingRun { records, stats })
}

fn first_frame(video: &str) -> Result<Frame> {
    let mut source = FileSource::open(video)?;
    source
        .next_frame()?
        .ok_or_else(|| anyhow!("video {} has no frames", video))
}

fn parse_bbox(value: &str) -> std::result::Result<BoundingBox, String> {
    let trimmed = value.trim().trim_start_matches('[').trim_end_matches(']');
    let parts: Vec<i32> = trimmed
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| format!("bbox must be four integers x,y,w,h; got '{}'", value))?;
    match parts.as_slice() {
        [x, y, w, h] if *w >= 0 && *h >= 0 => Ok(BoundingBox::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err("bbox width and height must be non-negative".to_string()),
        _ => Err(format!("bbox must have exactly four values; got '{}'", value)),
    }
}

fn print_json<T: Serialize>(value: &T, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize result")?;
    match output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
