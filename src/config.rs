use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CameraConfig;
use crate::frame::{FRAME_HEIGHT, FRAME_WIDTH};

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_CAMERA_DEVICE: &str = "stub://test-pattern";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_DEBOUNCE_SECS: u64 = 3;
const DEFAULT_SOUND_ASSET: &str = "fire_alarm.mp3";
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    http_addr: Option<String>,
    jpeg_quality: Option<u8>,
    camera: Option<CameraConfigFile>,
    alarm: Option<AlarmConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmConfigFile {
    debounce_secs: Option<u64>,
    sound_asset: Option<PathBuf>,
}

/// Daemon configuration: JSON file plus environment overrides.
#[derive(Debug, Clone)]
pub struct EmberwatchConfig {
    pub http_addr: String,
    pub jpeg_quality: u8,
    pub camera: CameraSettings,
    pub alarm: AlarmSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct AlarmSettings {
    pub debounce: Duration,
    pub sound_asset: Option<PathBuf>,
}

impl EmberwatchConfig {
    /// Load configuration. `EMBERWATCH_CONFIG` names an optional JSON
    /// file; individual `EMBERWATCH_*` variables override its fields.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("EMBERWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            target_fps: self.camera.target_fps,
        }
    }

    fn from_file(file: ConfigFile) -> Self {
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(FRAME_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(FRAME_HEIGHT),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
        };
        let alarm = AlarmSettings {
            debounce: Duration::from_secs(
                file.alarm
                    .as_ref()
                    .and_then(|alarm| alarm.debounce_secs)
                    .unwrap_or(DEFAULT_DEBOUNCE_SECS),
            ),
            sound_asset: file
                .alarm
                .and_then(|alarm| alarm.sound_asset)
                .or_else(|| Some(PathBuf::from(DEFAULT_SOUND_ASSET))),
        };
        Self {
            http_addr: file
                .http_addr
                .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            camera,
            alarm,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("EMBERWATCH_HTTP_ADDR") {
            if !addr.trim().is_empty() {
                self.http_addr = addr;
            }
        }
        if let Ok(device) = std::env::var("EMBERWATCH_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(asset) = std::env::var("EMBERWATCH_SOUND_ASSET") {
            if !asset.trim().is_empty() {
                self.alarm.sound_asset = Some(PathBuf::from(asset));
            }
        }
        if let Ok(debounce) = std::env::var("EMBERWATCH_DEBOUNCE_SECS") {
            let seconds: u64 = debounce.parse().map_err(|_| {
                anyhow!("EMBERWATCH_DEBOUNCE_SECS must be an integer number of seconds")
            })?;
            self.alarm.debounce = Duration::from_secs(seconds);
        }
        if let Ok(quality) = std::env::var("EMBERWATCH_JPEG_QUALITY") {
            self.jpeg_quality = quality
                .parse()
                .map_err(|_| anyhow!("EMBERWATCH_JPEG_QUALITY must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }
        if self.alarm.debounce.as_secs() == 0 {
            return Err(anyhow!("alarm debounce must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
