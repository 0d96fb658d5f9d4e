//! MJPEG streaming HTTP server.
//!
//! A small hand-rolled HTTP/1.1 server: one accept thread plus one
//! thread per connected viewer. Each viewer thread runs the full
//! capture, detect, alarm, annotate, encode cycle and writes the result
//! as one part of an unbounded `multipart/x-mixed-replace` response.
//!
//! Routes:
//! - `GET /`            embedded HTML viewer page
//! - `GET /video_feed`  the multipart JPEG stream
//! - `GET /health`      liveness probe
//! - `GET /status`      alarm and camera state as JSON

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::alarm::AlarmLatch;
use crate::annotate::annotate;
use crate::capture::CameraSupervisor;
use crate::detect::FireDetector;

const MAX_REQUEST_BYTES: usize = 8192;
const MULTIPART_BOUNDARY: &str = "frame";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>emberwatch</title>
<style>
body { background: #111; color: #ddd; font-family: sans-serif; text-align: center; }
img { margin-top: 1em; border: 2px solid #333; }
</style>
</head>
<body>
<h1>emberwatch live feed</h1>
<img src="/video_feed" alt="live camera feed" width="640" height="480">
</body>
</html>
"#;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub addr: String,
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
            jpeg_quality: 80,
        }
    }
}

/// One capture-to-JPEG pipeline shared by every viewer.
///
/// Viewers serialize on the camera mutex: the camera is one owned
/// resource, so concurrent streams take turns pulling frames. Each
/// pulled frame still runs the full detect/alarm/annotate cycle in the
/// puller's thread, and every viewer's cycle feeds the same latch.
pub struct Pipeline {
    camera: Mutex<CameraSupervisor>,
    detector: FireDetector,
    latch: AlarmLatch,
    frames_served: AtomicU64,
}

/// Snapshot returned by the `/status` route.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub alarm_active: bool,
    pub frames_served: u64,
    pub camera: String,
    pub camera_degraded: bool,
}

impl Pipeline {
    pub fn new(camera: CameraSupervisor, detector: FireDetector, latch: AlarmLatch) -> Self {
        Self {
            camera: Mutex::new(camera),
            detector,
            latch,
            frames_served: AtomicU64::new(0),
        }
    }

    pub fn latch(&self) -> &AlarmLatch {
        &self.latch
    }

    /// Run one full cycle and return the encoded JPEG, or `None` when
    /// encoding fails (the part is skipped; the stream continues).
    pub fn next_part(&self, quality: u8) -> Option<Vec<u8>> {
        let mut frame = self
            .camera
            .lock()
            .expect("camera supervisor lock poisoned")
            .next_frame();
        frame.ensure_size(
            self.detector.config().canonical_width,
            self.detector.config().canonical_height,
        );

        let regions = self.detector.detect(&frame);
        if !regions.is_empty() {
            self.latch.trigger();
        }
        self.latch.update();

        annotate(&mut frame, &regions, self.latch.is_active());

        match frame.encode_jpeg(quality) {
            Ok(jpeg) => {
                self.frames_served.fetch_add(1, Ordering::Relaxed);
                Some(jpeg)
            }
            Err(err) => {
                log::debug!("frame encode failed, skipping part: {err:#}");
                None
            }
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let camera = self
            .camera
            .lock()
            .expect("camera supervisor lock poisoned");
        StatusSnapshot {
            alarm_active: self.latch.is_active(),
            frames_served: self.frames_served.load(Ordering::Relaxed),
            camera: camera.device().to_string(),
            camera_degraded: camera.is_degraded(),
        }
    }
}

/// The streaming HTTP server.
pub struct StreamServer {
    config: StreamConfig,
    pipeline: Arc<Pipeline>,
}

impl StreamServer {
    pub fn new(config: StreamConfig, pipeline: Arc<Pipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Bind the listener and start the accept thread.
    pub fn spawn(self) -> Result<ServerHandle> {
        let configured_addr: SocketAddr = self.config.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let config = self.config.clone();
        let pipeline = self.pipeline;
        let join = std::thread::spawn(move || {
            run_server(listener, config, pipeline, shutdown_thread);
        });

        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

/// Stop handle for the accept thread. Viewer threads observe the same
/// shutdown flag and end their streams on the next cycle.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("stream server thread panicked"))?;
        }
        Ok(())
    }
}

fn run_server(
    listener: TcpListener,
    config: StreamConfig,
    pipeline: Arc<Pipeline>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let config = config.clone();
                let pipeline = pipeline.clone();
                let shutdown = shutdown.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &config, &pipeline, &shutdown) {
                        log::debug!("connection from {} ended: {err:#}", peer);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                log::error!("stream server accept failed: {}", err);
                break;
            }
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    config: &StreamConfig,
    pipeline: &Arc<Pipeline>,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let request = read_request(&mut stream)?;
    if request.method != "GET" {
        return write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#);
    }
    match request.path.as_str() {
        "/" => write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes()),
        "/health" => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        "/status" => {
            let body = serde_json::to_string(&pipeline.status())?;
            write_json_response(&mut stream, 200, &body)
        }
        "/video_feed" => stream_video(stream, config, pipeline, shutdown),
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// The unbounded multipart loop. Runs until the viewer disconnects or
/// the server shuts down; every cycle emits one JPEG part.
fn stream_video(
    mut stream: TcpStream,
    config: &StreamConfig,
    pipeline: &Arc<Pipeline>,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={boundary}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        boundary = MULTIPART_BOUNDARY
    );
    stream.write_all(header.as_bytes())?;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let Some(jpeg) = pipeline.next_part(config.jpeg_quality) else {
            continue;
        };
        let part_header = format!(
            "--{boundary}\r\nContent-Type: image/jpeg\r\n\r\n",
            boundary = MULTIPART_BOUNDARY
        );
        stream.write_all(part_header.as_bytes())?;
        stream.write_all(&jpeg)?;
        stream.write_all(b"\r\n")?;
    }
    Ok(())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let request_line = text
        .split("\r\n")
        .next()
        .ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

struct HttpRequest {
    method: String,
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CameraConfig;

    fn test_pipeline(device: &str) -> Arc<Pipeline> {
        let camera = CameraSupervisor::new(CameraConfig {
            device: device.to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        });
        Arc::new(Pipeline::new(
            camera,
            FireDetector::default(),
            AlarmLatch::new(),
        ))
    }

    #[test]
    fn plain_scene_produces_parts_without_alarming() {
        let pipeline = test_pipeline("stub://bench");
        let jpeg = pipeline.next_part(80).expect("encoded part");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(!pipeline.latch().is_active());

        let status = pipeline.status();
        assert_eq!(status.frames_served, 1);
        assert!(!status.alarm_active);
        assert!(!status.camera_degraded);
    }

    #[test]
    fn fire_scene_trips_the_latch() {
        let pipeline = test_pipeline("stub-fire://bench");
        pipeline.next_part(80).expect("encoded part");
        assert!(pipeline.latch().is_active());
        assert!(pipeline.status().alarm_active);
    }
}
