//! Emberwatch
//!
//! A webcam-based fire-color detector. Frames flow through a fixed
//! per-viewer cycle: capture, fire-color segmentation, alarm latch
//! update, overlay annotation, JPEG encode, one part of an unbounded
//! multipart HTTP stream. A single background siren thread plays the
//! alarm sound while the latch is active.
//!
//! # Module Structure
//!
//! - `capture`: camera sources (V4L2, HTTP, synthetic) and the
//!   reconnect supervisor
//! - `detect`: fire-color segmentation and region extraction
//! - `alarm`: debounced latch and the siren task
//! - `sound`: alarm playback backends
//! - `annotate`: detection overlays
//! - `server`: the streaming HTTP endpoint
//! - `config`: daemon configuration
//!
//! Detection is deliberately naive: a fixed HSV window per frame, no
//! temporal filtering. The latch's 3-second debounce is the only state
//! carried across frames.

pub mod alarm;
pub mod annotate;
pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod server;
pub mod sound;

pub use alarm::{AlarmLatch, AlarmSiren, SirenHandle, DEFAULT_DEBOUNCE_WINDOW};
pub use annotate::{annotate, ALARM_CAPTION, REGION_LABEL};
pub use capture::{CameraConfig, CameraSource, CameraStats, CameraSupervisor};
pub use config::EmberwatchConfig;
pub use detect::{DetectionRegion, FireDetector, FireDetectorConfig, MIN_REGION_AREA};
pub use frame::{Frame, FRAME_HEIGHT, FRAME_WIDTH};
pub use server::{Pipeline, ServerHandle, StatusSnapshot, StreamConfig, StreamServer};
pub use sound::{default_sounder, Sounder, TerminalBellSounder};
