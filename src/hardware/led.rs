//! LED output through the Linux LED class interface
//!
//! `/sys/class/leds/<name>/brightness` takes an integer in
//! `0..=max_brightness`. A plain GPIO LED reports `max_brightness` 1 and
//! is simply thresholded.

use std::path::{Path, PathBuf};

use super::LedOutput;
use crate::error::HardwareError;

/// LED backed by a sysfs LED class device
pub struct SysfsLed {
    name: String,
    brightness_path: PathBuf,
    max_brightness: u32,
}

impl SysfsLed {
    pub fn open(class_dir: &Path, name: &str) -> Result<Self, HardwareError> {
        let dir = class_dir.join(name);
        let max_path = dir.join("max_brightness");
        let max_brightness = std::fs::read_to_string(&max_path)
            .map_err(|e| HardwareError::DeviceNotFound(format!("{}: {}", max_path.display(), e)))?
            .trim()
            .parse::<u32>()
            .map_err(|e| HardwareError::DeviceNotFound(format!("{}: {}", max_path.display(), e)))?;

        if max_brightness == 0 {
            return Err(HardwareError::DeviceNotFound(format!(
                "{} reports max_brightness 0",
                dir.display()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            brightness_path: dir.join("brightness"),
            max_brightness,
        })
    }

    /// Map a 0..1 level onto the device's integer scale
    pub fn scale(&self, level: f32) -> u32 {
        (level.clamp(0.0, 1.0) * self.max_brightness as f32).round() as u32
    }
}

impl LedOutput for SysfsLed {
    fn set_intensity(&self, level: f32) -> Result<(), HardwareError> {
        std::fs::write(&self.brightness_path, self.scale(level).to_string())
            .map_err(|e| HardwareError::LedWrite(format!("{}: {}", self.name, e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// LED used when the device is missing
pub struct NullLed {
    name: String,
}

impl NullLed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl LedOutput for NullLed {
    fn set_intensity(&self, _level: f32) -> Result<(), HardwareError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
