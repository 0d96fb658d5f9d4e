use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use emberwatch::EmberwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "EMBERWATCH_CONFIG",
        "EMBERWATCH_HTTP_ADDR",
        "EMBERWATCH_CAMERA_DEVICE",
        "EMBERWATCH_SOUND_ASSET",
        "EMBERWATCH_DEBOUNCE_SECS",
        "EMBERWATCH_JPEG_QUALITY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = EmberwatchConfig::load().expect("load config");

    assert_eq!(cfg.http_addr, "0.0.0.0:5000");
    assert_eq!(cfg.jpeg_quality, 80);
    assert_eq!(cfg.camera.device, "stub://test-pattern");
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.alarm.debounce.as_secs(), 3);
    assert_eq!(cfg.alarm.sound_asset, Some(PathBuf::from("fire_alarm.mp3")));

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "http_addr": "0.0.0.0:8080",
        "jpeg_quality": 60,
        "camera": {
            "device": "/dev/video2",
            "width": 800,
            "height": 600,
            "target_fps": 15
        },
        "alarm": {
            "debounce_secs": 5,
            "sound_asset": "sounds/siren.mp3"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("EMBERWATCH_CONFIG", file.path());
    std::env::set_var("EMBERWATCH_CAMERA_DEVICE", "stub://override");
    std::env::set_var("EMBERWATCH_DEBOUNCE_SECS", "7");

    let cfg = EmberwatchConfig::load().expect("load config");

    assert_eq!(cfg.http_addr, "0.0.0.0:8080");
    assert_eq!(cfg.jpeg_quality, 60);
    assert_eq!(cfg.camera.device, "stub://override");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.alarm.debounce.as_secs(), 7);
    assert_eq!(cfg.alarm.sound_asset, Some(PathBuf::from("sounds/siren.mp3")));

    clear_env();
}

#[test]
fn rejects_zero_debounce() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("EMBERWATCH_DEBOUNCE_SECS", "0");
    assert!(EmberwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_out_of_range_jpeg_quality() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("EMBERWATCH_JPEG_QUALITY", "0");
    assert!(EmberwatchConfig::load().is_err());

    std::env::set_var("EMBERWATCH_JPEG_QUALITY", "101");
    assert!(EmberwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"not json").expect("write config");
    std::env::set_var("EMBERWATCH_CONFIG", file.path());

    assert!(EmberwatchConfig::load().is_err());

    clear_env();
}
