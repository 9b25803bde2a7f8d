//! Player detector client.
//!
//! `PlayerDetector` turns one frame (or an image already on disk) into a list
//! of normalized player detections. The direct model endpoint is tried first;
//! when it fails the pipeline endpoint is tried once. Nothing past this
//! boundary raises: callers get a `DetectionOutcome` that is either a (possibly
//! empty) detection list or an `Unavailable` marker with the reason.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use super::backend::InferenceEndpoint;
use super::backends::{ModelEndpoint, WorkflowEndpoint};
use super::response::parse_response;
use super::result::{BoundingBox, Detection};
use crate::config::DetectorSettings;
use crate::frame::Frame;

/// Result of one endpoint attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Attempt {
    Detections(Vec<Detection>),
    /// The endpoint failed in a way another strategy might not.
    TryFallback(String),
    /// Nothing left to try.
    Failed(String),
}

/// What a detect call produced.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionOutcome {
    /// The service answered. The list may be empty.
    Detected(Vec<Detection>),
    /// Every strategy failed.
    Unavailable { reason: String },
}

impl DetectionOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DetectionOutcome::Unavailable { .. })
    }

    pub fn detections(&self) -> &[Detection] {
        match self {
            DetectionOutcome::Detected(detections) => detections,
            DetectionOutcome::Unavailable { .. } => &[],
        }
    }

    /// Collapse to a list; a failed call reads as "no detections".
    pub fn into_detections(self) -> Vec<Detection> {
        match self {
            DetectionOutcome::Detected(detections) => detections,
            DetectionOutcome::Unavailable { .. } => Vec::new(),
        }
    }
}

/// Remote player detector with a direct-model primary and a pipeline fallback.
pub struct PlayerDetector {
    primary: Box<dyn InferenceEndpoint>,
    fallback: Option<Box<dyn InferenceEndpoint>>,
    classes: Vec<String>,
}

impl PlayerDetector {
    pub fn new(primary: Box<dyn InferenceEndpoint>, classes: Vec<String>) -> Self {
        Self {
            primary,
            fallback: None,
            classes,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn InferenceEndpoint>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Build the hosted detector described by `settings`.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        log::info!(
            "detector: model {} via {} (key {}, confidence {:.2}, overlap {:.2})",
            settings.model_id(),
            settings.api_url,
            settings.redacted_key(),
            settings.confidence,
            settings.overlap
        );
        let primary = ModelEndpoint::new(settings)?;
        let mut detector = Self::new(Box::new(primary), settings.classes.clone());
        if settings.fallback.enabled {
            detector = detector.with_fallback(Box::new(WorkflowEndpoint::new(settings)?));
        }
        Ok(detector)
    }

    /// Detect players in an in-memory frame.
    ///
    /// The frame is written to a temporary JPEG that is removed when this call
    /// returns, on every path.
    pub fn detect_frame(&mut self, frame: &Frame) -> DetectionOutcome {
        let image = match write_temp_jpeg(frame) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("could not stage frame for upload: {:#}", err);
                return DetectionOutcome::Unavailable {
                    reason: format!("{:#}", err),
                };
            }
        };
        self.detect_path(image.path())
    }

    /// Detect players in an image already on disk.
    pub fn detect_path(&mut self, image_path: &Path) -> DetectionOutcome {
        let reason = match self.attempt_primary(image_path) {
            Attempt::Detections(detections) => return DetectionOutcome::Detected(detections),
            Attempt::TryFallback(reason) => {
                log::warn!(
                    "{} detection failed: {}; trying fallback",
                    self.primary.name(),
                    reason
                );
                match self.attempt_fallback(image_path) {
                    Attempt::Detections(detections) => {
                        return DetectionOutcome::Detected(detections)
                    }
                    Attempt::TryFallback(reason) | Attempt::Failed(reason) => reason,
                }
            }
            Attempt::Failed(reason) => reason,
        };
        log::warn!("player detection unavailable: {}", reason);
        DetectionOutcome::Unavailable { reason }
    }

    /// Bounding boxes for the player-selection view.
    pub fn bounding_boxes(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self.detect_frame(frame)
            .into_detections()
            .iter()
            .map(Detection::bbox)
            .collect()
    }

    fn attempt_primary(&mut self, image_path: &Path) -> Attempt {
        let has_fallback = self.fallback.is_some();
        match run_endpoint(self.primary.as_mut(), image_path, &self.classes) {
            Ok(detections) => Attempt::Detections(detections),
            Err(reason) if has_fallback => Attempt::TryFallback(reason),
            Err(reason) => Attempt::Failed(reason),
        }
    }

    fn attempt_fallback(&mut self, image_path: &Path) -> Attempt {
        let Some(fallback) = self.fallback.as_mut() else {
            return Attempt::Failed("no fallback endpoint configured".to_string());
        };
        log::info!("using {} fallback", fallback.name());
        match run_endpoint(fallback.as_mut(), image_path, &self.classes) {
            Ok(detections) => Attempt::Detections(detections),
            Err(reason) => {
                Attempt::Failed(format!("{} fallback failed: {}", fallback.name(), reason))
            }
        }
    }
}

fn run_endpoint(
    endpoint: &mut dyn InferenceEndpoint,
    image_path: &Path,
    classes: &[String],
) -> std::result::Result<Vec<Detection>, String> {
    let value = endpoint
        .infer(image_path)
        .map_err(|err| format!("{:#}", err))?;
    let parsed = parse_response(&value, classes).map_err(|err| err.to_string())?;
    log::debug!(
        "{}: {} player(s) from '{}', {} item(s) skipped",
        endpoint.name(),
        parsed.detections.len(),
        parsed.field.key(),
        parsed.skipped
    );
    Ok(parsed.detections)
}

fn write_temp_jpeg(frame: &Frame) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("rink-frame-")
        .suffix(".jpg")
        .tempfile()
        .context("create temporary frame file")?;
    let bytes = frame.to_jpeg_bytes()?;
    file.write_all(&bytes).context("write temporary frame file")?;
    file.flush().context("flush temporary frame file")?;
    Ok(file)
}
