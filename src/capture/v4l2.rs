//! V4L2 webcam backend.
//!
//! Captures RGB frames from a local device node. The device URI is
//! either an explicit path (`/dev/video0`) or `auto://`, which probes
//! `/dev/video0` through `/dev/video9` and takes the first node that
//! opens.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use crate::capture::{CameraConfig, CameraStats};
use crate::frame::Frame;

const AUTO_PROBE_MAX: u32 = 10;

pub(crate) struct V4l2Camera {
    config: CameraConfig,
    state: Option<V4l2State>,
    resolved_path: Option<String>,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub(crate) fn new(config: CameraConfig) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            resolved_path: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = self.resolve_device_path()?;
        let mut device = v4l::Device::with_path(&path)
            .with_context(|| format!("open v4l2 device {}", path))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = device
            .set_format(&format)
            .with_context(|| format!("set v4l2 format on {}", path))?;
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(anyhow!(
                "device {} negotiated {} instead of RGB3",
                path,
                format.fourcc
            ));
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("camera: failed to set fps on {}: {}", path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "camera: connected to {} ({}x{})",
            path,
            self.active_width,
            self.active_height
        );
        self.resolved_path = Some(path);
        Ok(())
    }

    fn resolve_device_path(&self) -> Result<String> {
        if !self.config.device.starts_with("auto") {
            return Ok(self.config.device.clone());
        }
        for index in 0..AUTO_PROBE_MAX {
            let candidate = format!("/dev/video{index}");
            if v4l::Device::with_path(&candidate).is_ok() {
                log::info!("camera: auto-probe selected {candidate}");
                return Ok(candidate);
            }
        }
        Err(anyhow!(
            "auto-probe found no usable device in /dev/video0..{}",
            AUTO_PROBE_MAX - 1
        ))
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let expected = (self.active_width * self.active_height * 3) as usize;
        if buf.len() < expected {
            return Err(anyhow!(
                "short v4l2 frame: {} bytes, expected {}",
                buf.len(),
                expected
            ));
        }
        let image = RgbImage::from_raw(self.active_width, self.active_height, buf[..expected].to_vec())
            .ok_or_else(|| anyhow!("v4l2 frame did not fill an RGB buffer"))?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Frame::from_rgb(image))
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self
                .resolved_path
                .clone()
                .unwrap_or_else(|| self.config.device.clone()),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}
