use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://detect.roboflow.com";
const DEFAULT_WORKFLOW_URL: &str = "https://serverless.roboflow.com";
const DEFAULT_CONFIDENCE: f32 = 0.3;
const DEFAULT_OVERLAP: f32 = 0.5;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SETTLE_MS: u64 = 2_000;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_PROGRESS_EVERY: u64 = 10;
const DEFAULT_CLASSES: [&str; 2] = ["player", "person"];

#[derive(Debug, Deserialize, Default)]
struct RinkConfigFile {
    detector: Option<DetectorConfigFile>,
    tracking: Option<TrackingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    api_url: Option<String>,
    workflow_url: Option<String>,
    api_key: Option<String>,
    workspace: Option<String>,
    workflow_id: Option<String>,
    confidence: Option<f32>,
    overlap: Option<f32>,
    timeout_secs: Option<u64>,
    classes: Option<Vec<String>>,
    fallback: Option<FallbackConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FallbackConfigFile {
    enabled: Option<bool>,
    ephemeral_session: Option<bool>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    target_fps: Option<u32>,
    anchor: Option<String>,
    progress_every: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RinkConfig {
    pub detector: DetectorSettings,
    pub tracking: TrackingSettings,
}

/// Remote detector connection and thresholds.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub api_url: String,
    pub workflow_url: String,
    pub api_key: String,
    pub workspace: String,
    pub workflow_id: String,
    /// Minimum confidence, 0..1.
    pub confidence: f32,
    /// Overlap (IoU) threshold for the remote NMS, 0..1.
    pub overlap: f32,
    /// Per-request timeout. Applies to connect, read and write.
    pub timeout: Duration,
    /// Class labels kept after normalization.
    pub classes: Vec<String>,
    pub fallback: FallbackSettings,
}

#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub enabled: bool,
    /// Open a short-lived session when the long-lived one is unavailable.
    pub ephemeral_session: bool,
    /// Wait applied after opening a short-lived session.
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    pub target_fps: u32,
    pub anchor: AnchorMode,
    pub progress_every: u64,
}

/// Which center the tracker measures candidate distances from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnchorMode {
    /// Center of the previous match; the anchor drifts with the player.
    #[default]
    LastMatch,
    /// Center of the user's initial selection, for the whole video.
    Initial,
}

impl AnchorMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "last_match" | "last-match" | "drift" => Ok(AnchorMode::LastMatch),
            "initial" | "fixed" => Ok(AnchorMode::Initial),
            other => Err(anyhow!(
                "unknown anchor mode '{}'; expected last_match or initial",
                other
            )),
        }
    }
}

impl DetectorSettings {
    /// Remote model identifier, `<workspace>/<workflow_id>`.
    pub fn model_id(&self) -> String {
        format!("{}/{}", self.workspace, self.workflow_id)
    }

    /// API key safe for logs.
    pub fn redacted_key(&self) -> String {
        redact_key(&self.api_key)
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            workflow_url: DEFAULT_WORKFLOW_URL.to_string(),
            api_key: String::new(),
            workspace: String::new(),
            workflow_id: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            overlap: DEFAULT_OVERLAP,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            fallback: FallbackSettings::default(),
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ephemeral_session: true,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            anchor: AnchorMode::LastMatch,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl RinkConfig {
    /// Load from `$RINK_CONFIG` (JSON, optional), then apply `RINK_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RINK_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RinkConfigFile) -> Result<Self> {
        let defaults = DetectorSettings::default();
        let detector_file = file.detector.unwrap_or_default();
        let fallback_file = detector_file.fallback.unwrap_or_default();
        let fallback_defaults = FallbackSettings::default();

        let detector = DetectorSettings {
            api_url: detector_file.api_url.unwrap_or(defaults.api_url),
            workflow_url: detector_file.workflow_url.unwrap_or(defaults.workflow_url),
            api_key: detector_file.api_key.unwrap_or_default(),
            workspace: detector_file.workspace.unwrap_or_default(),
            workflow_id: detector_file.workflow_id.unwrap_or_default(),
            confidence: detector_file.confidence.unwrap_or(defaults.confidence),
            overlap: detector_file.overlap.unwrap_or(defaults.overlap),
            timeout: detector_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            classes: detector_file.classes.unwrap_or(defaults.classes),
            fallback: FallbackSettings {
                enabled: fallback_file.enabled.unwrap_or(fallback_defaults.enabled),
                ephemeral_session: fallback_file
                    .ephemeral_session
                    .unwrap_or(fallback_defaults.ephemeral_session),
                settle: fallback_file
                    .settle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(fallback_defaults.settle),
            },
        };

        let tracking_file = file.tracking.unwrap_or_default();
        let tracking = TrackingSettings {
            target_fps: tracking_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            anchor: match tracking_file.anchor.as_deref() {
                Some(anchor) => AnchorMode::parse(anchor)?,
                None => AnchorMode::default(),
            },
            progress_every: tracking_file
                .progress_every
                .unwrap_or(DEFAULT_PROGRESS_EVERY),
        };

        Ok(Self { detector, tracking })
    }

    fn apply_env(&mut self) -> Result<()> {
        let detector = &mut self.detector;
        for (key, slot) in [
            ("RINK_API_URL", &mut detector.api_url),
            ("RINK_WORKFLOW_URL", &mut detector.workflow_url),
            ("RINK_API_KEY", &mut detector.api_key),
            ("RINK_WORKSPACE", &mut detector.workspace),
            ("RINK_WORKFLOW_ID", &mut detector.workflow_id),
        ] {
            if let Ok(value) = std::env::var(key) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                }
            }
        }
        if let Some(confidence) = env_parse::<f32>("RINK_CONFIDENCE", "a number in 0..1")? {
            detector.confidence = confidence;
        }
        if let Some(overlap) = env_parse::<f32>("RINK_OVERLAP", "a number in 0..1")? {
            detector.overlap = overlap;
        }
        if let Some(secs) = env_parse::<u64>("RINK_TIMEOUT_SECS", "an integer number of seconds")? {
            detector.timeout = Duration::from_secs(secs);
        }
        if let Some(fps) = env_parse::<u32>("RINK_TARGET_FPS", "a positive integer")? {
            self.tracking.target_fps = fps;
        }
        if let Ok(anchor) = std::env::var("RINK_ANCHOR") {
            if !anchor.trim().is_empty() {
                self.tracking.anchor = AnchorMode::parse(&anchor)?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let detector = &mut self.detector;
        if !(0.0..=1.0).contains(&detector.confidence) {
            return Err(anyhow!("confidence must be within 0..1"));
        }
        if !(0.0..=1.0).contains(&detector.overlap) {
            return Err(anyhow!("overlap must be within 0..1"));
        }
        if detector.timeout.is_zero() {
            return Err(anyhow!("detector timeout must be greater than zero"));
        }
        if detector.workspace.trim().is_empty() || detector.workflow_id.trim().is_empty() {
            return Err(anyhow!(
                "detector workspace and workflow_id must be set (RINK_WORKSPACE, RINK_WORKFLOW_ID)"
            ));
        }
        detector.classes = detector
            .classes
            .iter()
            .map(|class| class.trim().to_lowercase())
            .filter(|class| !class.is_empty())
            .collect();
        if detector.classes.is_empty() {
            return Err(anyhow!("at least one detection class is required"));
        }
        if self.tracking.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        Ok(())
    }
}

/// First 8 characters of a key, for log lines.
pub fn redact_key(key: &str) -> String {
    if key.is_empty() {
        return "<unset>".to_string();
    }
    let prefix: String = key.chars().take(8).collect();
    format!("{}…", prefix)
}

fn read_config_file(path: &Path) -> Result<RinkConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_parse<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        _ => Ok(None),
    }
}
