//! TEA5767 FM tuner over Linux I2C
//!
//! The chip takes a 5-byte write with the PLL word for high-side injection
//! against a 32.768 kHz crystal. Soft mute, high-cut and stereo noise
//! cancelling are always on.

use nix::libc::c_int;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use super::Tuner;
use crate::error::HardwareError;

// I2C_SLAVE from <linux/i2c-dev.h>
nix::ioctl_write_int_bad!(i2c_set_slave, 0x0703);

/// Intermediate frequency added for high-side injection
const IF_HZ: u64 = 225_000;

/// Reference crystal
const XTAL_HZ: u64 = 32_768;

/// Build the 5-byte control word for `khz`
pub fn control_bytes(khz: u32, mono: bool) -> [u8; 5] {
    let pll = (4 * (khz as u64 * 1000 + IF_HZ) / XTAL_HZ) as u16;
    [
        ((pll >> 8) & 0x3F) as u8,
        (pll & 0xFF) as u8,
        if mono { 0x18 } else { 0x10 },
        0x1E,
        0x00,
    ]
}

/// TEA5767 on an I2C bus
pub struct Tea5767 {
    device: Mutex<File>,
    mono: bool,
    name: String,
}

impl Tea5767 {
    /// Open `/dev/i2c-<bus>`, bind the slave address and read the status
    /// register once to make sure the chip answers.
    pub fn open(bus: u32, address: u16) -> Result<Self, HardwareError> {
        let path = format!("/dev/i2c-{}", bus);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HardwareError::DeviceNotFound(format!("{}: {}", path, e)))?;

        // SAFETY: the fd is owned by `file` and stays open for the call.
        unsafe { i2c_set_slave(file.as_raw_fd(), address as c_int) }
            .map_err(|e| HardwareError::I2c(format!("I2C_SLAVE 0x{:02X}: {}", address, e)))?;

        let mut status = [0u8; 5];
        file.read_exact(&mut status).map_err(|e| {
            HardwareError::DeviceNotFound(format!("TEA5767 not responding at 0x{:02X}: {}", address, e))
        })?;
        tracing::info!("TEA5767 found at 0x{:02X}, status bytes {:02X?}", address, status);

        Ok(Self {
            device: Mutex::new(file),
            mono: false,
            name: format!("tea5767@{}:0x{:02X}", path, address),
        })
    }

    /// Force mono reception (clearer voices, less stereo air)
    pub fn with_mono(mut self, mono: bool) -> Self {
        self.mono = mono;
        self
    }
}

impl Tuner for Tea5767 {
    fn set_frequency(&self, khz: u32) -> Result<(), HardwareError> {
        let bytes = control_bytes(khz, self.mono);
        self.device
            .lock()
            .write_all(&bytes)
            .map_err(|e| HardwareError::I2c(format!("write {} kHz: {}", khz, e)))?;
        tracing::trace!("Tuned to {:.1} MHz", khz as f32 / 1000.0);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Tuner used when no chip is present
pub struct NullTuner;

impl Tuner for NullTuner {
    fn set_frequency(&self, _khz: u32) -> Result<(), HardwareError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes_100mhz() {
        // 4 * (100.225 MHz) / 32768 = 12234 = 0x2FCA
        let bytes = control_bytes(100_000, false);
        assert_eq!(bytes, [0x2F, 0xCA, 0x10, 0x1E, 0x00]);
    }

    #[test]
    fn test_control_bytes_mono_flag() {
        assert_eq!(control_bytes(88_000, true)[2], 0x18);
        assert_eq!(control_bytes(88_000, false)[2], 0x10);
    }

    #[test]
    fn test_pll_high_bits_masked() {
        for khz in [88_000, 98_000, 108_000] {
            assert_eq!(control_bytes(khz, false)[0] & 0xC0, 0);
        }
    }

    #[test]
    fn test_open_missing_bus_fails() {
        assert!(matches!(
            Tea5767::open(250, 0x60),
            Err(HardwareError::DeviceNotFound(_))
        ));
    }
}
