//! Network camera backend.
//!
//! Ingests frames from cameras that stream MJPEG over HTTP or serve a
//! single JPEG snapshot per request (the snapshot endpoint is polled).
//! Frames are decoded in memory and decimated to the configured rate.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use url::Url;

use crate::capture::{CameraConfig, CameraStats};
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

pub(crate) struct HttpCamera {
    config: CameraConfig,
    mode: Option<HttpMode>,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    frame_count: u64,
}

enum HttpMode {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpCamera {
    pub(crate) fn new(config: CameraConfig) -> Result<Self> {
        let url = Url::parse(&config.device).context("parse camera url")?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported camera url scheme '{}'; expected http or https",
                url.scheme()
            ));
        }
        Ok(Self {
            config,
            mode: None,
            connected_at: None,
            last_frame_at: None,
            frame_count: 0,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.device)
            .call()
            .context("connect to http camera")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            self.mode = Some(HttpMode::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            self.mode = Some(HttpMode::Snapshot);
        }
        self.connected_at = Some(Instant::now());
        log::info!("camera: connected to {}", self.config.device);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mode = self
            .mode
            .as_mut()
            .ok_or_else(|| anyhow!("http camera not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);

        loop {
            let jpeg = match mode {
                HttpMode::Mjpeg(stream) => stream.next_jpeg(),
                HttpMode::Snapshot => fetch_snapshot(&self.config.device),
            }?;

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let image = image::load_from_memory(&jpeg)
                .context("decode camera jpeg")?
                .into_rgb8();
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Ok(Frame::from_rgb(image));
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

/// Incremental scanner that carves JPEG frames out of a multipart body.
struct MjpegStream {
    reader: Box<dyn Read + Send>,
    pending: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            pending: Vec::with_capacity(64 * 1024),
        }
    }

    fn next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = jpeg_bounds(&self.pending) {
                let frame = self.pending[start..end].to_vec();
                self.pending.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.pending.extend_from_slice(&chunk[..read]);

            // Never buffer more than two frames' worth of garbage.
            if self.pending.len() > MAX_JPEG_BYTES * 2 {
                let drain_to = self.pending.len() - 2;
                self.pending.drain(..drain_to);
            }
        }
    }
}

fn jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = find_marker(buffer, JPEG_SOI, 0)?;
    let end = find_marker(buffer, JPEG_EOI, start + 2)?;
    Some((start, end + 2))
}

fn find_marker(buffer: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    if from >= buffer.len() {
        return None;
    }
    buffer[from..]
        .windows(2)
        .position(|window| window == marker)
        .map(|offset| offset + from)
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bounds_finds_a_complete_frame() {
        let mut body = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        body.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        body.extend_from_slice(b"\r\n--boundary");

        let (start, end) = jpeg_bounds(&body).expect("frame bounds");
        assert_eq!(&body[start..start + 2], &JPEG_SOI);
        assert_eq!(&body[end - 2..end], &JPEG_EOI);
    }

    #[test]
    fn jpeg_bounds_waits_for_the_trailer() {
        let mut body = vec![0xFF, 0xD8, 1, 2, 3];
        assert!(jpeg_bounds(&body).is_none());
        body.extend_from_slice(&[0xFF, 0xD9]);
        assert!(jpeg_bounds(&body).is_some());
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let config = CameraConfig {
            device: "ftp://camera".to_string(),
            ..CameraConfig::default()
        };
        assert!(HttpCamera::new(config).is_err());
    }
}
