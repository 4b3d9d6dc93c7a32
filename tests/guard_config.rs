use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use fast_guard::config::GuardConfig;
use fast_guard::{ActionSpec, DispatchMode, RoiPoint, ScoringPolicy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FAST_GUARD_CONFIG",
        "FAST_GUARD_SOURCE",
        "FAST_GUARD_ROI",
        "FAST_GUARD_MOTION_THRESHOLD",
        "FAST_GUARD_COOLDOWN_SECS",
        "FAST_GUARD_GRACE_SECS",
        "FAST_GUARD_ACTION",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "capture": {
                "source": "/dev/video2",
                "width": 640,
                "height": 480,
                "target_fps": 15,
                "warmup_frames": 10
            },
            "roi": [[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]],
            "detection": {
                "blur_kernel": 7,
                "diff_threshold": 25,
                "scoring": "intensity_sum",
                "motion_threshold": 90000,
                "confirm_frames": 4,
                "bootstrap_frames": 30,
                "adaptation_rate": 0.05
            },
            "timing": {
                "cooldown_secs": 5.0,
                "grace_secs": 1.5
            },
            "action": { "kind": "command", "program": "notify-send", "args": ["motion"] },
            "dispatch": "inline"
        }"#,
    );

    std::env::set_var("FAST_GUARD_CONFIG", file.path());
    std::env::set_var("FAST_GUARD_MOTION_THRESHOLD", "120000");
    std::env::set_var("FAST_GUARD_GRACE_SECS", "0.5");

    let cfg = GuardConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "/dev/video2");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.warmup_frames, 10);
    assert_eq!(cfg.roi.points().len(), 4);
    assert_eq!(cfg.pipeline.blur_kernel, 7);
    assert_eq!(cfg.pipeline.diff_threshold, 25);
    assert_eq!(cfg.pipeline.scoring, ScoringPolicy::IntensitySum);
    assert_eq!(cfg.pipeline.debounce.motion_threshold, 120000);
    assert_eq!(cfg.pipeline.debounce.confirm_frames, 4);
    assert_eq!(cfg.pipeline.bootstrap_frames, 30);
    assert_eq!(cfg.pipeline.adaptation_rate, 0.05);
    assert_eq!(cfg.pipeline.debounce.cooldown, Duration::from_secs(5));
    assert_eq!(cfg.pipeline.debounce.grace, Duration::from_millis(500));
    assert_eq!(
        cfg.action,
        ActionSpec::Command {
            program: "notify-send".to_string(),
            args: vec!["motion".to_string()],
        }
    );
    assert_eq!(cfg.dispatch, DispatchMode::Inline);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
roi = [[0.0, 0.0], [0.5, 0.0], [0.5, 0.5]]

[capture]
source = "stub://intruder"

[detection]
confirm_frames = 5

[action]
kind = "log"
"#,
    );

    let cfg = GuardConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.source.url, "stub://intruder");
    assert_eq!(cfg.roi.points()[1], RoiPoint::new(0.5, 0.0));
    assert_eq!(cfg.pipeline.debounce.confirm_frames, 5);
    assert_eq!(cfg.pipeline.debounce.motion_threshold, 2200);
    assert_eq!(cfg.action, ActionSpec::Log);

    clear_env();
}

#[test]
fn env_overrides_source_roi_and_action() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FAST_GUARD_SOURCE", "stub://static");
    std::env::set_var("FAST_GUARD_ROI", "0.2:0.2,0.8:0.2,0.5:0.8");
    std::env::set_var("FAST_GUARD_COOLDOWN_SECS", "10");
    std::env::set_var("FAST_GUARD_ACTION", "command:touch /tmp/fast-guard-fired");

    let cfg = GuardConfig::load().expect("load config");
    assert_eq!(cfg.source.url, "stub://static");
    assert_eq!(cfg.roi.points()[2], RoiPoint::new(0.5, 0.8));
    assert_eq!(cfg.pipeline.debounce.cooldown, Duration::from_secs(10));
    assert_eq!(
        cfg.action,
        ActionSpec::Command {
            program: "touch".to_string(),
            args: vec!["/tmp/fast-guard-fired".to_string()],
        }
    );

    clear_env();
}

#[test]
fn rejects_malformed_roi() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let two_points = write_config(".json", r#"{ "roi": [[0.1, 0.1], [0.9, 0.9]] }"#);
    assert!(GuardConfig::load_from(Some(two_points.path())).is_err());

    let out_of_range = write_config(
        ".json",
        r#"{ "roi": [[0.1, 0.1], [1.2, 0.1], [0.5, 0.9]] }"#,
    );
    assert!(GuardConfig::load_from(Some(out_of_range.path())).is_err());

    std::env::set_var("FAST_GUARD_ROI", "0.1:0.1,nan:0.5,0.5:0.9");
    assert!(GuardConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_invalid_tunables() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for json in [
        r#"{ "detection": { "blur_kernel": 4 } }"#,
        r#"{ "detection": { "confirm_frames": 0 } }"#,
        r#"{ "detection": { "bootstrap_frames": 0 } }"#,
        r#"{ "detection": { "adaptation_rate": 1.5 } }"#,
        r#"{ "timing": { "cooldown_secs": -2.0 } }"#,
        r#"{ "capture": { "width": 0 } }"#,
        r#"{ "capture": { "target_fps": 0 } }"#,
        r#"{ "detection": { "sensitivity": 3 } }"#,
    ] {
        let file = write_config(".json", json);
        assert!(
            GuardConfig::load_from(Some(file.path())).is_err(),
            "accepted {}",
            json
        );
    }

    std::env::set_var("FAST_GUARD_MOTION_THRESHOLD", "lots");
    assert!(GuardConfig::load().is_err());
    clear_env();

    std::env::set_var("FAST_GUARD_ACTION", "explode");
    assert!(GuardConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FAST_GUARD_CONFIG", "/nonexistent/fast-guard.toml");
    let err = GuardConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
