//! # OracleBox Hub
//!
//! Hub daemon for the OracleBox: drives the FM tuner sweep, two status LEDs and
//! the live audio routing (raw passthrough or a sox effects chain), answers a
//! line-based command protocol from the controller app, and ingests event
//! reports from wireless sensor satellites.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐                         ┌──────────────────────┐
//! │  Controller (phone)  │                         │ Satellites (REM Pod, │
//! │  "FX PRESET SET .."  │                         │  Music Box) JSON line│
//! └──────────┬───────────┘                         └──────────┬───────────┘
//!            │ TCP, line per command                          │ TCP, one line
//!            ▼                                                ▼
//! ┌──────────────────────┐                         ┌──────────────────────┐
//! │ Command Server       │                         │ Satellite Ingest     │
//! │ (network::command)   │                         │ (ingest)             │
//! │ parse → Command enum │                         │ validate → log       │
//! └──────────┬───────────┘                         └───┬──────────────┬───┘
//!            │ Hub::execute                            │ activity log │ alerts
//!            ▼                                         ▼              ▼
//! ┌────────────────────────────────────────────┐   ┌──────────────────────┐
//! │ StateStore (state): one locked record      │   │ Announcer (voice)    │
//! │ HubState · LedSettings · FxParameters ·    │   │ serialized playback, │
//! │ preset catalog  ──► JSON snapshot on commit│   │ pauses the route     │
//! └──────┬──────────────┬──────────────┬───────┘   └──────────┬───────────┘
//!        │              │              │                      │ pause/resume
//!        ▼              ▼              ▼                      ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────────────────────────────────┐
//! │SweepEngine │ │LedAnimator │ │ FxManager ─► AudioSupervisor task      │
//! │ tick loop  │─►│ 20ms tick  │ │ (fx)        owns exactly one child:    │
//! │            │ │            │ │             passthrough | effects chain│
//! └─────┬──────┘ └─────┬──────┘ └────────────────────┬───────────────────┘
//!       ▼              ▼                             ▼
//! ┌────────────┐ ┌────────────┐              ┌───────────────┐
//! │ TEA5767    │ │ LED class  │              │ arecord | sox │
//! │ (I2C)      │ │ (sysfs)    │              │   | aplay     │
//! └────────────┘ └────────────┘              └───────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod fx;
pub mod hardware;
pub mod hub;
pub mod ingest;
pub mod led;
pub mod network;
pub mod protocol;
pub mod state;
pub mod sweep;
pub mod voice;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sweep step intervals in milliseconds, fastest first
    pub const SWEEP_SPEEDS_MS: [u32; 7] = [50, 100, 150, 200, 250, 300, 350];

    /// Index into `SWEEP_SPEEDS_MS` used when nothing is persisted (150 ms)
    pub const DEFAULT_SPEED_INDEX: usize = 2;

    /// Default TCP port for controller commands
    pub const DEFAULT_COMMAND_PORT: u16 = 5050;

    /// Default TCP port satellites report to
    pub const DEFAULT_SATELLITE_PORT: u16 = 8888;

    /// Range accepted by `FM TUNE` (76.0 to 108.0 MHz)
    pub const FM_TUNE_MIN_KHZ: u32 = 76_000;
    pub const FM_TUNE_MAX_KHZ: u32 = 108_000;

    /// Bound on one blocking driver call (I2C write, amixer run)
    pub const DEFAULT_IO_TIMEOUT_MS: u64 = 2000;

    /// Speaker playback volume steps on the USB card
    pub const SPEAKER_VOLUME_MAX: u8 = 37;

    /// Mic capture volume steps on the USB card
    pub const MIC_VOLUME_MAX: u8 = 35;

    /// Lower sweep bound (88.0 MHz)
    pub const DEFAULT_SWEEP_MIN_KHZ: u32 = 88_000;

    /// Upper sweep bound (108.0 MHz)
    pub const DEFAULT_SWEEP_MAX_KHZ: u32 = 108_000;

    /// Sweep step (0.2 MHz)
    pub const DEFAULT_SWEEP_STEP_KHZ: u32 = 200;

    /// LED animation tick
    pub const DEFAULT_LED_TICK_MS: u64 = 20;

    /// TEA5767 7-bit I2C address
    pub const TEA5767_ADDR: u16 = 0x60;

    /// Consecutive hardware write failures before a device is flagged degraded
    pub const DEGRADED_AFTER_FAILURES: u32 = 3;

    /// Maximum accepted command line length
    pub const MAX_COMMAND_LINE: usize = 1024;

    /// Maximum accepted satellite event line length
    pub const MAX_SATELLITE_LINE: usize = 1024;

    /// Satellite events kept in memory
    pub const ACTIVITY_LOG_CAPACITY: usize = 200;

    /// Announcement playback limit
    pub const STARTUP_SOUND_TIMEOUT_SECS: u64 = 30;

    /// Reserved preset label for parameters that match no catalog entry
    pub const CUSTOM_PRESET: &str = "CUSTOM";

    /// Minimum distance between the band-pass edges
    pub const BANDPASS_MIN_GAP_HZ: i32 = 200;

    /// Fixed sox chain for the raw passthrough route
    pub const PASSTHROUGH_EFFECTS: &str =
        "highpass 250 lowpass 4800 compand 0.08,0.2 -28,-18 6 gain -3 remix 1,2 1,2";

    /// Sound file extensions the announcer can play
    pub const SUPPORTED_SOUND_EXTENSIONS: [&str; 2] = ["wav", "mp3"];
}
