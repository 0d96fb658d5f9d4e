use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use emberwatch::{AlarmLatch, AlarmSiren, Sounder};

struct CountingSounder {
    plays: Arc<AtomicU32>,
}

impl Sounder for CountingSounder {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn play_alarm(&mut self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        Ok(())
    }
}

struct BrokenSounder {
    attempts: Arc<AtomicU32>,
}

impl Sounder for BrokenSounder {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn play_alarm(&mut self) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("no audio device"))
    }
}

#[test]
fn siren_plays_while_latched_and_stops_after_clear() {
    let plays = Arc::new(AtomicU32::new(0));
    let latch = AlarmLatch::with_window(Duration::from_millis(50));
    latch.trigger();

    let handle = AlarmSiren::spawn(
        latch.clone(),
        Box::new(CountingSounder {
            plays: plays.clone(),
        }),
    );

    std::thread::sleep(Duration::from_millis(100));
    assert!(plays.load(Ordering::SeqCst) >= 1, "siren never played");

    // Let the debounce window lapse and clear the latch.
    std::thread::sleep(Duration::from_millis(60));
    latch.update();
    assert!(!latch.is_active());

    // Allow any in-flight play to finish, then the count must settle.
    std::thread::sleep(Duration::from_millis(50));
    let settled = plays.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(plays.load(Ordering::SeqCst), settled);

    handle.stop().expect("stop siren");
}

#[test]
fn playback_failure_leaves_the_latch_alone() {
    let attempts = Arc::new(AtomicU32::new(0));
    let latch = AlarmLatch::with_window(Duration::from_secs(60));
    latch.trigger();

    let handle = AlarmSiren::spawn(
        latch.clone(),
        Box::new(BrokenSounder {
            attempts: attempts.clone(),
        }),
    );

    std::thread::sleep(Duration::from_millis(250));
    assert!(attempts.load(Ordering::SeqCst) >= 1, "siren never tried");
    assert!(latch.is_active(), "sound failure must not clear the alarm");

    handle.stop().expect("stop siren");
}

#[test]
fn idle_siren_stops_cleanly() {
    let latch = AlarmLatch::new();
    let handle = AlarmSiren::spawn(
        latch,
        Box::new(CountingSounder {
            plays: Arc::new(AtomicU32::new(0)),
        }),
    );
    std::thread::sleep(Duration::from_millis(50));
    handle.stop().expect("stop siren");
}
