//! Alarm latch and siren task.
//!
//! The latch is a debounced boolean: it goes active the instant a frame
//! yields a detection and clears only after a quiet period with no
//! detections. One siren thread per process observes the latch and
//! plays the alarm sound while it is active.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::sound::Sounder;

/// Quiet period required before a latched alarm clears.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(3);

/// Poll interval of the siren thread while the alarm is idle.
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct AlarmState {
    active: bool,
    last_detected_at: Option<Instant>,
}

/// Shared debounced alarm latch. Clones are handles to the same state.
///
/// Invariant: `is_active()` holds exactly when a detection was reported
/// within the debounce window, as of the most recent `update()` call.
/// The check runs once per frame, so clearing is frame-rate-exact, not
/// wall-clock-exact.
#[derive(Clone)]
pub struct AlarmLatch {
    state: Arc<Mutex<AlarmState>>,
    window: Duration,
}

impl AlarmLatch {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_DEBOUNCE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(AlarmState::default())),
            window,
        }
    }

    /// Report a detection: latch on and refresh the quiet-period clock.
    pub fn trigger(&self) {
        let mut state = self.state.lock().expect("alarm state lock poisoned");
        state.active = true;
        state.last_detected_at = Some(Instant::now());
    }

    /// Run the debounce check. Call once per frame, detections or not.
    /// Never re-triggers: with no new detections, repeated calls only
    /// ever move the latch from active to idle.
    pub fn update(&self) {
        let mut state = self.state.lock().expect("alarm state lock poisoned");
        if !state.active {
            return;
        }
        if let Some(last) = state.last_detected_at {
            if last.elapsed() > self.window {
                state.active = false;
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.state
            .lock()
            .expect("alarm state lock poisoned")
            .active
    }
}

impl Default for AlarmLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Background siren task. Exactly one per process, started at startup.
pub struct AlarmSiren;

impl AlarmSiren {
    /// Spawn the siren thread. While the latch is active it plays the
    /// alarm sound to completion and immediately re-checks, so the
    /// sound repeats back to back; while idle it polls every 100 ms.
    /// Playback failures are logged and otherwise ignored: the latch is
    /// never affected by the sound subsystem.
    pub fn spawn(latch: AlarmLatch, mut sounder: Box<dyn Sounder>) -> SirenHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            while !shutdown_thread.load(Ordering::SeqCst) {
                if latch.is_active() {
                    if let Err(err) = sounder.play_alarm() {
                        log::warn!("alarm playback failed: {err:#}");
                        std::thread::sleep(IDLE_POLL);
                    }
                } else {
                    std::thread::sleep(IDLE_POLL);
                }
            }
        });
        SirenHandle {
            shutdown,
            join: Some(join),
        }
    }
}

/// Stop handle for the siren thread.
pub struct SirenHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SirenHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("siren thread panicked"))?;
        }
        Ok(())
    }
}
