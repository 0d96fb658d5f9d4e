use anyhow::{anyhow, bail, Result};
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device URI. Supported schemes: `stub://`, `stub-fire://`,
    /// `stub-failing://` (synthetic), `/dev/videoN` and `auto://`
    /// (feature camera-v4l2), `http(s)://` (feature camera-http).
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate. Sources decimate to this rate; 0 disables pacing.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://test-pattern".to_string(),
            width: crate::frame::FRAME_WIDTH,
            height: crate::frame::FRAME_HEIGHT,
            target_fps: 10,
        }
    }
}

/// Camera source facade. The backend is selected by URI scheme.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    V4l2(super::v4l2::V4l2Camera),
    #[cfg(feature = "camera-http")]
    Http(super::http::HttpCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)?),
            });
        }
        if config.device.starts_with("http://") || config.device.starts_with("https://") {
            #[cfg(feature = "camera-http")]
            {
                return Ok(Self {
                    backend: CameraBackend::Http(super::http::HttpCamera::new(config)?),
                });
            }
            #[cfg(not(feature = "camera-http"))]
            bail!(
                "camera device '{}' requires the camera-http feature",
                config.device
            );
        }
        if config.device.starts_with("/dev/") || config.device.starts_with("auto") {
            #[cfg(feature = "camera-v4l2")]
            {
                return Ok(Self {
                    backend: CameraBackend::V4l2(super::v4l2::V4l2Camera::new(config)?),
                });
            }
            #[cfg(not(feature = "camera-v4l2"))]
            bail!(
                "camera device '{}' requires the camera-v4l2 feature",
                config.device
            );
        }
        bail!(
            "unsupported camera device '{}'; expected stub://, http(s)://, /dev/videoN, or auto://",
            config.device
        )
    }

    /// Open the underlying capture resource.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.connect(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(camera) => camera.connect(),
        }
    }

    /// Capture the next frame, paced to the configured frame rate.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.next_frame(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(camera) => camera.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_healthy(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.is_healthy(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(camera) => camera.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.stats(),
            #[cfg(feature = "camera-http")]
            CameraBackend::Http(camera) => camera.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic sources (stub://) for tests and bench setups
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pattern {
    /// Drifting gray checkerboard; never fire-colored.
    Plain,
    /// Same, plus a solid orange block that the detector will flag.
    Fire,
}

struct SyntheticCamera {
    config: CameraConfig,
    pattern: Pattern,
    /// When set, reads fail after this many frames per connection.
    fail_after: Option<u64>,
    connected: bool,
    frame_count: u64,
    frames_since_connect: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Result<Self> {
        let (pattern, fail_after) = parse_stub_device(&config.device)?;
        Ok(Self {
            config,
            pattern,
            fail_after,
            connected: false,
            frame_count: 0,
            frames_since_connect: 0,
            last_frame_at: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.frames_since_connect = 0;
        log::info!("camera: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            bail!("synthetic camera not connected; call connect() first");
        }
        if let Some(limit) = self.fail_after {
            if self.frames_since_connect >= limit {
                self.connected = false;
                bail!("synthetic read failure after {limit} frames");
            }
        }

        self.pace();
        self.frame_count += 1;
        self.frames_since_connect += 1;
        Ok(Frame::from_rgb(self.render()))
    }

    fn pace(&mut self) {
        if self.config.target_fps > 0 {
            let interval = Duration::from_millis((1000 / self.config.target_fps).max(1) as u64);
            if let Some(last) = self.last_frame_at {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    std::thread::sleep(interval - elapsed);
                }
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn render(&self) -> RgbImage {
        let drift = self.frame_count as u32;
        let fire = self.pattern == Pattern::Fire;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            if fire && (100..180).contains(&x) && (100..180).contains(&y) {
                return Rgb([255, 128, 0]);
            }
            let shade = (((x / 8 + y / 8 + drift) % 2) * 18 + 52) as u8;
            Rgb([shade, shade, shade])
        })
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

fn parse_stub_device(device: &str) -> Result<(Pattern, Option<u64>)> {
    let (scheme, remainder) = device
        .split_once("://")
        .ok_or_else(|| anyhow!("malformed stub device '{}'", device))?;
    let fail_after = query_param(remainder, "fail_after")
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| anyhow!("fail_after must be an integer in '{}'", device))
        })
        .transpose()?;
    match scheme {
        "stub" => Ok((Pattern::Plain, fail_after)),
        "stub-fire" => Ok((Pattern::Fire, fail_after)),
        "stub-failing" => Ok((Pattern::Plain, Some(fail_after.unwrap_or(3)))),
        other => bail!("unknown stub scheme '{}'", other),
    }
}

fn query_param(remainder: &str, key: &str) -> Option<String> {
    let (_, query) = remainder.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
