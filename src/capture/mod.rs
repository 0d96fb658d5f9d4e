//! Camera acquisition.
//!
//! This module provides the frame sources feeding the pipeline:
//! - USB/V4L2 webcams, with index auto-probing (feature: camera-v4l2)
//! - Network cameras speaking MJPEG or JPEG snapshots (feature: camera-http)
//! - Synthetic sources (`stub://` schemes, testing)
//!
//! All sources produce `Frame` instances through the same contract:
//! `connect()`, then `next_frame()` until it fails. Sources decimate to
//! the configured frame rate and report health so the supervisor can
//! decide when to replace them.
//!
//! `CameraSupervisor` owns the live source slot and implements the
//! reconnect policy: a failed read discards the handle and reacquires;
//! while no camera can be acquired, it produces placeholder frames at
//! 1 Hz instead of terminating the stream.

mod camera;
mod supervisor;

#[cfg(feature = "camera-http")]
mod http;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use supervisor::CameraSupervisor;
