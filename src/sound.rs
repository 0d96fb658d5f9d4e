//! Alarm sound playback.
//!
//! The siren drives a `Sounder`, which plays one alarm cycle to
//! completion per call. The rodio backend plays the configured audio
//! asset and falls back to a plain sine beep when the asset is missing
//! or undecodable; without the `alarm-rodio` feature the terminal bell
//! stands in. Playback failures never propagate past the siren.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// One alarm sound cycle per call, blocking until it finishes.
pub trait Sounder: Send {
    /// Backend identifier, for startup logging.
    fn name(&self) -> &'static str;

    /// Play one alarm cycle to completion.
    fn play_alarm(&mut self) -> Result<()>;
}

/// Pick the best sounder the build provides.
#[cfg(feature = "alarm-rodio")]
pub fn default_sounder(asset: Option<PathBuf>) -> Box<dyn Sounder> {
    Box::new(RodioSounder::new(asset))
}

/// Pick the best sounder the build provides.
#[cfg(not(feature = "alarm-rodio"))]
pub fn default_sounder(asset: Option<PathBuf>) -> Box<dyn Sounder> {
    if asset.is_some() {
        log::warn!("sound asset configured but the alarm-rodio feature is not compiled in");
    }
    Box::new(TerminalBellSounder)
}

/// Degraded beep: the ASCII bell, once per second.
pub struct TerminalBellSounder;

impl Sounder for TerminalBellSounder {
    fn name(&self) -> &'static str {
        "terminal-bell"
    }

    fn play_alarm(&mut self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        std::thread::sleep(Duration::from_secs(1));
        Ok(())
    }
}

#[cfg(feature = "alarm-rodio")]
pub use rodio_backend::RodioSounder;

#[cfg(feature = "alarm-rodio")]
mod rodio_backend {
    use super::Sounder;
    use anyhow::{Context, Result};
    use rodio::source::{SineWave, Source};
    use rodio::{Decoder, OutputStream, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;
    use std::time::Duration;

    const BEEP_FREQ_HZ: f32 = 2500.0;
    const BEEP_DURATION: Duration = Duration::from_secs(1);

    /// Plays the configured asset; missing or broken assets degrade to a
    /// sine beep on the same output device.
    pub struct RodioSounder {
        asset: Option<PathBuf>,
        asset_warned: bool,
    }

    impl RodioSounder {
        pub fn new(asset: Option<PathBuf>) -> Self {
            Self {
                asset,
                asset_warned: false,
            }
        }

        fn try_play_asset(&self) -> Result<()> {
            let path = self
                .asset
                .as_ref()
                .filter(|path| path.exists())
                .context("no alarm sound asset on disk")?;
            let (_stream, handle) =
                OutputStream::try_default().context("open audio output device")?;
            let sink = Sink::try_new(&handle).context("create audio sink")?;
            let file = File::open(path)
                .with_context(|| format!("open alarm sound asset {}", path.display()))?;
            let source = Decoder::new(BufReader::new(file)).context("decode alarm sound asset")?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        }

        fn beep(&self) -> Result<()> {
            let (_stream, handle) =
                OutputStream::try_default().context("open audio output device")?;
            let sink = Sink::try_new(&handle).context("create audio sink")?;
            sink.append(
                SineWave::new(BEEP_FREQ_HZ)
                    .take_duration(BEEP_DURATION)
                    .amplify(0.25),
            );
            sink.sleep_until_end();
            Ok(())
        }
    }

    impl Sounder for RodioSounder {
        fn name(&self) -> &'static str {
            "rodio"
        }

        fn play_alarm(&mut self) -> Result<()> {
            match self.try_play_asset() {
                Ok(()) => Ok(()),
                Err(err) => {
                    if !self.asset_warned {
                        log::warn!("alarm asset unavailable, using beep: {err:#}");
                        self.asset_warned = true;
                    }
                    self.beep()
                }
            }
        }
    }
}
