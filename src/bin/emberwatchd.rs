//! emberwatchd - fire-watch camera daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + environment overrides)
//! 2. Supervises the camera, degrading to placeholder frames when absent
//! 3. Spawns the alarm siren task
//! 4. Serves the annotated MJPEG stream over HTTP

use anyhow::Result;
use std::sync::{mpsc, Arc};

use emberwatch::{
    alarm::{AlarmLatch, AlarmSiren},
    capture::CameraSupervisor,
    detect::{FireDetector, FireDetectorConfig},
    server::{Pipeline, StreamConfig, StreamServer},
    sound, EmberwatchConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EmberwatchConfig::load()?;

    let latch = AlarmLatch::with_window(config.alarm.debounce);
    let camera = CameraSupervisor::new(config.camera_config());
    let detector = FireDetector::new(FireDetectorConfig {
        canonical_width: config.camera.width,
        canonical_height: config.camera.height,
        ..FireDetectorConfig::default()
    });
    let pipeline = Arc::new(Pipeline::new(camera, detector, latch.clone()));

    let sounder = sound::default_sounder(config.alarm.sound_asset.clone());
    log::info!("alarm siren using {} backend", sounder.name());
    let siren = AlarmSiren::spawn(latch, sounder);

    let stream_config = StreamConfig {
        addr: config.http_addr.clone(),
        jpeg_quality: config.jpeg_quality,
    };
    let server = StreamServer::new(stream_config, pipeline).spawn()?;
    log::info!("viewer page at http://{}/", server.addr);
    log::info!("video feed at http://{}/video_feed", server.addr);
    log::info!(
        "watching {} with a {}s debounce",
        config.camera.device,
        config.alarm.debounce.as_secs()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("emberwatchd running. waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping...");
    server.stop()?;
    siren.stop()?;

    Ok(())
}
