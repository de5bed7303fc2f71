//! Hardware drivers
//!
//! Thin synchronous wrappers around the hub's physical I/O. Each device sits
//! behind a trait so the engines can run against null drivers when the board
//! is missing a part (or in tests).

pub mod led;
pub mod mixer;
pub mod tuner;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::constants::DEFAULT_IO_TIMEOUT_MS;
use crate::error::HardwareError;

pub use led::{NullLed, SysfsLed};
pub use mixer::{AmixerMixer, MixerSetting, MixerStatus, NullMixer};
pub use tuner::{NullTuner, Tea5767};

/// FM tuner that accepts a frequency in kHz
pub trait Tuner: Send + Sync {
    fn set_frequency(&self, khz: u32) -> Result<(), HardwareError>;

    fn name(&self) -> &str;
}

/// Single dimmable LED
pub trait LedOutput: Send + Sync {
    /// Set brightness, `level` in 0.0..=1.0
    fn set_intensity(&self, level: f32) -> Result<(), HardwareError>;

    fn name(&self) -> &str;
}

/// Sound card mixer
pub trait Mixer: Send + Sync {
    fn set_mute(&self, muted: bool) -> Result<(), HardwareError>;

    fn apply(&self, setting: MixerSetting) -> Result<(), HardwareError>;

    fn status(&self) -> Result<MixerStatus, HardwareError>;
}

/// Run a blocking driver call on the blocking pool, giving up after `limit`
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, HardwareError>
where
    F: FnOnce() -> Result<T, HardwareError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(HardwareError::Task(e.to_string())),
        Err(_) => Err(HardwareError::Timeout),
    }
}

/// Which real devices were found at startup
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct HardwarePresence {
    pub tuner: bool,
    pub sweep_led: bool,
    pub box_led: bool,
    pub mixer: bool,
}

/// The full set of drivers the daemon runs against
#[derive(Clone)]
pub struct Hardware {
    pub tuner: Arc<dyn Tuner>,
    pub sweep_led: Arc<dyn LedOutput>,
    pub box_led: Arc<dyn LedOutput>,
    pub mixer: Arc<dyn Mixer>,
    pub presence: HardwarePresence,
    /// Bound on any one driver call made from async code
    pub io_timeout: Duration,
}

impl Hardware {
    /// Open every configured device, substituting a null driver for any that
    /// fail so the daemon keeps running in a reduced mode.
    pub fn detect(config: &AppConfig) -> Self {
        let hw = &config.hardware;
        if hw.disabled {
            tracing::warn!("Hardware disabled by configuration, running with null drivers");
            return Self::null();
        }

        let mut presence = HardwarePresence::default();

        let tuner: Arc<dyn Tuner> = match Tea5767::open(hw.i2c_bus, hw.tuner_address) {
            Ok(t) => {
                presence.tuner = true;
                Arc::new(t.with_mono(hw.tuner_mono))
            }
            Err(e) => {
                tracing::warn!("FM tuner unavailable, sweeps will run without FM: {}", e);
                Arc::new(NullTuner)
            }
        };

        let sweep_led = open_led(&hw.led_class_dir, &hw.sweep_led, &mut presence.sweep_led);
        let box_led = open_led(&hw.led_class_dir, &hw.box_led, &mut presence.box_led);

        let io_timeout = Duration::from_millis(hw.io_timeout_ms);
        let amixer = AmixerMixer::new(hw.mixer.clone(), io_timeout);
        let mixer: Arc<dyn Mixer> = match amixer.check_card() {
            Ok(()) => {
                presence.mixer = true;
                Arc::new(amixer)
            }
            Err(e) => {
                tracing::warn!("Mixer on card {} unavailable: {}", hw.mixer.card, e);
                Arc::new(NullMixer)
            }
        };

        Self {
            tuner,
            sweep_led,
            box_led,
            mixer,
            presence,
            io_timeout,
        }
    }

    /// All-null drivers ("no hardware" mode)
    pub fn null() -> Self {
        Self {
            tuner: Arc::new(NullTuner),
            sweep_led: Arc::new(NullLed::new("sweep")),
            box_led: Arc::new(NullLed::new("box")),
            mixer: Arc::new(NullMixer),
            presence: HardwarePresence::default(),
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
        }
    }
}

fn open_led(dir: &std::path::Path, name: &str, present: &mut bool) -> Arc<dyn LedOutput> {
    match SysfsLed::open(dir, name) {
        Ok(led) => {
            *present = true;
            Arc::new(led)
        }
        Err(e) => {
            tracing::warn!("LED {} unavailable: {}", name, e);
            Arc::new(NullLed::new(name))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_hardware_uses_null_drivers() {
        let mut config = AppConfig::default();
        config.hardware.disabled = true;
        let hw = Hardware::detect(&config);
        assert_eq!(hw.presence, HardwarePresence::default());
        assert!(hw.tuner.set_frequency(100_000).is_ok());
        assert!(hw.sweep_led.set_intensity(1.0).is_ok());
        assert!(hw.mixer.set_mute(true).is_ok());
    }

    #[test]
    fn test_missing_led_falls_back_to_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut present = false;
        let led = open_led(dir.path(), "absent", &mut present);
        assert!(!present);
        assert_eq!(led.name(), "absent");
        assert!(led.set_intensity(0.5).is_ok());
    }

    #[test]
    fn test_absent_mixer_card_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.hardware.i2c_bus = 250;
        config.hardware.led_class_dir = dir.path().to_path_buf();
        config.hardware.mixer.card = 97;
        let hw = Hardware::detect(&config);
        assert!(!hw.presence.mixer);
        assert!(!hw.presence.tuner);
        assert!(hw.mixer.set_mute(true).is_ok());
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let started = std::time::Instant::now();
        let result = bounded(Duration::from_millis(100), || {
            std::thread::sleep(Duration::from_millis(600));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(HardwareError::Timeout)));
        assert!(started.elapsed() < Duration::from_millis(500));

        assert_eq!(bounded(Duration::from_secs(1), || Ok(7)).await.unwrap(), 7);
    }
}
