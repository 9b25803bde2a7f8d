use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use rink_tracker::config::{AnchorMode, RinkConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RINK_CONFIG",
        "RINK_API_URL",
        "RINK_WORKFLOW_URL",
        "RINK_API_KEY",
        "RINK_WORKSPACE",
        "RINK_WORKFLOW_ID",
        "RINK_CONFIDENCE",
        "RINK_OVERLAP",
        "RINK_TIMEOUT_SECS",
        "RINK_TARGET_FPS",
        "RINK_ANCHOR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "detector": {
            "api_url": "https://detect.internal.test",
            "api_key": "file-key-123456",
            "workspace": "hockey-league",
            "workflow_id": "players-v2",
            "confidence": 0.45,
            "overlap": 0.6,
            "timeout_secs": 12,
            "classes": ["Player", " goalie "],
            "fallback": {"enabled": false, "settle_ms": 250}
        },
        "tracking": {
            "target_fps": 15,
            "anchor": "initial",
            "progress_every": 25
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("RINK_CONFIG", file.path());
    std::env::set_var("RINK_API_KEY", "env-key-abcdefgh");
    std::env::set_var("RINK_TARGET_FPS", "10");

    let cfg = RinkConfig::load().expect("load config");

    assert_eq!(cfg.detector.api_url, "https://detect.internal.test");
    assert_eq!(cfg.detector.api_key, "env-key-abcdefgh");
    assert_eq!(cfg.detector.model_id(), "hockey-league/players-v2");
    assert_eq!(cfg.detector.confidence, 0.45);
    assert_eq!(cfg.detector.overlap, 0.6);
    assert_eq!(cfg.detector.timeout, Duration::from_secs(12));
    assert_eq!(cfg.detector.classes, vec!["player", "goalie"]);
    assert!(!cfg.detector.fallback.enabled);
    assert!(cfg.detector.fallback.ephemeral_session);
    assert_eq!(cfg.detector.fallback.settle, Duration::from_millis(250));
    assert_eq!(cfg.tracking.target_fps, 10);
    assert_eq!(cfg.tracking.anchor, AnchorMode::Initial);
    assert_eq!(cfg.tracking.progress_every, 25);
    assert_eq!(cfg.detector.redacted_key(), "env-key-…");

    clear_env();
}

#[test]
fn env_only_config_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RINK_WORKSPACE", "hockey");
    std::env::set_var("RINK_WORKFLOW_ID", "custom-workflow-3");

    let cfg = RinkConfig::load().expect("load config");
    assert_eq!(cfg.detector.api_url, "https://detect.roboflow.com");
    assert_eq!(cfg.detector.workflow_url, "https://serverless.roboflow.com");
    assert_eq!(cfg.detector.confidence, 0.3);
    assert_eq!(cfg.detector.overlap, 0.5);
    assert_eq!(cfg.detector.timeout, Duration::from_secs(30));
    assert_eq!(cfg.detector.classes, vec!["player", "person"]);
    assert!(cfg.detector.fallback.enabled);
    assert_eq!(cfg.detector.fallback.settle, Duration::from_secs(2));
    assert_eq!(cfg.tracking.target_fps, 30);
    assert_eq!(cfg.tracking.anchor, AnchorMode::LastMatch);
    assert_eq!(cfg.tracking.progress_every, 10);
    assert_eq!(cfg.detector.redacted_key(), "<unset>");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    assert!(RinkConfig::load().is_err(), "workspace is required");

    std::env::set_var("RINK_WORKSPACE", "hockey");
    std::env::set_var("RINK_WORKFLOW_ID", "players");

    for (key, value) in [
        ("RINK_CONFIDENCE", "1.5"),
        ("RINK_OVERLAP", "lots"),
        ("RINK_TIMEOUT_SECS", "0"),
        ("RINK_TARGET_FPS", "0"),
        ("RINK_ANCHOR", "sideways"),
    ] {
        std::env::set_var(key, value);
        assert!(RinkConfig::load().is_err(), "{key}={value} should be rejected");
        std::env::remove_var(key);
    }

    assert!(RinkConfig::load().is_ok());

    clear_env();
}

#[test]
fn rejects_unreadable_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("RINK_CONFIG", file.path());
    std::env::set_var("RINK_WORKSPACE", "hockey");
    std::env::set_var("RINK_WORKFLOW_ID", "players");

    let err = RinkConfig::load().expect_err("malformed json");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
