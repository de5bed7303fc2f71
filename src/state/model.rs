//! Persisted hub settings

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::constants::{DEFAULT_SPEED_INDEX, SWEEP_SPEEDS_MS};
use crate::ingest::DeviceClass;

/// Sweep step interval, always one of `SWEEP_SPEEDS_MS`
///
/// Serialized as its millisecond value; deserializing snaps to the nearest
/// table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed(usize);

impl Speed {
    /// Nearest table entry to `ms` (ties go to the faster entry)
    pub fn from_ms(ms: u32) -> Self {
        let index = SWEEP_SPEEDS_MS
            .iter()
            .enumerate()
            .min_by_key(|(_, &table_ms)| table_ms.abs_diff(ms))
            .map(|(i, _)| i)
            .unwrap_or(DEFAULT_SPEED_INDEX);
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn ms(self) -> u32 {
        SWEEP_SPEEDS_MS[self.0]
    }

    pub fn interval(self) -> Duration {
        Duration::from_millis(self.ms() as u64)
    }

    /// One table entry shorter, saturating at the fastest
    pub fn faster(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// One table entry longer, saturating at the slowest
    pub fn slower(self) -> Self {
        Self((self.0 + 1).min(SWEEP_SPEEDS_MS.len() - 1))
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(DEFAULT_SPEED_INDEX)
    }
}

impl Serialize for Speed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.ms())
    }
}

impl<'de> Deserialize<'de> for Speed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Speed::from_ms)
    }
}

/// Sweep direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

/// LED animation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedMode {
    On,
    Off,
    Breath,
    BreathFast,
    Heartbeat,
    Strobe,
    Flicker,
    RandomBurst,
    /// Pulse on every sweep step
    Sweep,
}

impl LedMode {
    pub const ALL: [LedMode; 9] = [
        LedMode::On,
        LedMode::Off,
        LedMode::Breath,
        LedMode::BreathFast,
        LedMode::Heartbeat,
        LedMode::Strobe,
        LedMode::Flicker,
        LedMode::RandomBurst,
        LedMode::Sweep,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LedMode::On => "on",
            LedMode::Off => "off",
            LedMode::Breath => "breath",
            LedMode::BreathFast => "breath_fast",
            LedMode::Heartbeat => "heartbeat",
            LedMode::Strobe => "strobe",
            LedMode::Flicker => "flicker",
            LedMode::RandomBurst => "random_burst",
            LedMode::Sweep => "sweep",
        }
    }
}

impl fmt::Display for LedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two physical LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedChannel {
    Sweep,
    Box,
}

impl LedChannel {
    pub const ALL: [LedChannel; 2] = [LedChannel::Sweep, LedChannel::Box];

    pub fn index(self) -> usize {
        match self {
            LedChannel::Sweep => 0,
            LedChannel::Box => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LedChannel::Sweep => "SWEEP",
            LedChannel::Box => "BOX",
        }
    }
}

/// Sweep, LED and announcement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubState {
    #[serde(rename = "speed_ms")]
    pub speed: Speed,
    pub direction: Direction,
    pub running: bool,
    pub sweep_led_mode: LedMode,
    pub box_led_mode: LedMode,

    /// Startup announcement, relative to the sounds root; empty for none
    pub startup_sound: String,

    pub muted: bool,

    /// Alert played for REM Pod field triggers; empty for the default
    pub rempod_sound: String,
    /// Alert played for music box motion; empty for the default
    pub musicbox_sound: String,
}

impl Default for HubState {
    fn default() -> Self {
        Self {
            speed: Speed::default(),
            direction: Direction::Up,
            running: false,
            sweep_led_mode: LedMode::Sweep,
            box_led_mode: LedMode::Flicker,
            startup_sound: String::new(),
            muted: false,
            rempod_sound: String::new(),
            musicbox_sound: String::new(),
        }
    }
}

impl HubState {
    pub fn led_mode(&self, channel: LedChannel) -> LedMode {
        match channel {
            LedChannel::Sweep => self.sweep_led_mode,
            LedChannel::Box => self.box_led_mode,
        }
    }

    pub fn set_led_mode(&mut self, channel: LedChannel, mode: LedMode) {
        match channel {
            LedChannel::Sweep => self.sweep_led_mode = mode,
            LedChannel::Box => self.box_led_mode = mode,
        }
    }

    pub fn alert_sound(&self, device: DeviceClass) -> &str {
        match device {
            DeviceClass::Rempod => &self.rempod_sound,
            DeviceClass::Musicbox => &self.musicbox_sound,
        }
    }

    pub fn alert_sound_mut(&mut self, device: DeviceClass) -> &mut String {
        match device {
            DeviceClass::Rempod => &mut self.rempod_sound,
            DeviceClass::Musicbox => &mut self.musicbox_sound,
        }
    }
}

/// Brightness window and animation speed for one LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub min_brightness: u8,
    pub max_brightness: u8,
    /// 1 (slowest) to 10 (fastest)
    pub speed: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            min_brightness: 0,
            max_brightness: 255,
            speed: 3,
        }
    }
}

impl ChannelSettings {
    pub const MIN_SPEED: u8 = 1;
    pub const MAX_SPEED: u8 = 10;

    /// Map a 0..1 animation level into the configured window, as 0..1
    pub fn scale(&self, level: f32) -> f32 {
        let lo = self.min_brightness as f32 / 255.0;
        let hi = self.max_brightness as f32 / 255.0;
        lo + (hi - lo) * level.clamp(0.0, 1.0)
    }

    /// Duration multiplier derived from `speed`: 10/6 at speed 1, 1/6 at 10
    pub fn speed_factor(&self) -> f32 {
        let speed = self.speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED);
        (11 - speed) as f32 / 6.0
    }
}

/// Per-channel LED settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedSettings {
    pub sweep: ChannelSettings,
    #[serde(rename = "box")]
    pub box_led: ChannelSettings,
}

impl LedSettings {
    pub fn channel(&self, channel: LedChannel) -> &ChannelSettings {
        match channel {
            LedChannel::Sweep => &self.sweep,
            LedChannel::Box => &self.box_led,
        }
    }

    pub fn channel_mut(&mut self, channel: LedChannel) -> &mut ChannelSettings {
        match channel {
            LedChannel::Sweep => &mut self.sweep,
            LedChannel::Box => &mut self.box_led,
        }
    }
}
