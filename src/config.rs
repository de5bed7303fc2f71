//! Daemon configuration
//!
//! Loaded from a TOML file. Every section has defaults so a missing file,
//! or a file that only overrides a few keys, still yields a usable config.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub paths: PathsConfig,
    pub sweep: SweepConfig,
    pub leds: LedConfig,
    pub audio: AudioConfig,
    pub voice: VoiceConfig,
    pub hardware: HardwareConfig,
    pub boot: BootConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Default config file location (`~/.config/oraclebox/hub.toml` on Linux)
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("hub.toml"))
            .unwrap_or_else(|| PathBuf::from("hub.toml"))
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), Error> {
        if self.sweep.min_khz >= self.sweep.max_khz {
            return Err(Error::Config(format!(
                "sweep.min_khz ({}) must be below sweep.max_khz ({})",
                self.sweep.min_khz, self.sweep.max_khz
            )));
        }
        if self.sweep.step_khz == 0 {
            return Err(Error::Config("sweep.step_khz must be non-zero".into()));
        }
        if self.leds.tick_ms == 0 {
            return Err(Error::Config("leds.tick_ms must be non-zero".into()));
        }
        if self.hardware.io_timeout_ms == 0 {
            return Err(Error::Config("hardware.io_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "OracleBox", "oraclebox")
}

/// Listener addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address for the command server
    pub command_addr: SocketAddr,
    /// Bind address for satellite ingest
    pub satellite_addr: SocketAddr,
    /// Listen backlog for both sockets
    pub backlog: i32,
    /// Seconds a satellite has to deliver its line
    pub satellite_read_timeout_secs: u64,
    /// Seconds allowed for writing one reply to a controller
    pub reply_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            command_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_COMMAND_PORT)),
            satellite_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_SATELLITE_PORT)),
            backlog: 16,
            satellite_read_timeout_secs: 5,
            reply_timeout_secs: 5,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted hub snapshot (JSON)
    pub state_file: PathBuf,
    /// Root of the sound library
    pub sounds_dir: PathBuf,
    /// JSON-lines mirror of the satellite activity log
    pub activity_log: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            state_file: data.join("state.json"),
            sounds_dir: data.join("sounds"),
            activity_log: Some(data.join("activity.jsonl")),
        }
    }
}

/// Sweep register bounds and behaviour at the edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub min_khz: u32,
    pub max_khz: u32,
    pub step_khz: u32,
    /// Reverse direction when a bound is reached instead of parking there
    pub bounce: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_khz: DEFAULT_SWEEP_MIN_KHZ,
            max_khz: DEFAULT_SWEEP_MAX_KHZ,
            step_khz: DEFAULT_SWEEP_STEP_KHZ,
            bounce: false,
        }
    }
}

/// LED animation timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub tick_ms: u64,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_LED_TICK_MS,
        }
    }
}

/// Audio routing pipelines
///
/// Both templates are run through `sh -c` in their own process group.
/// `{capture}` and `{output}` expand to the ALSA devices; the effects
/// template additionally expands `{effects}` to the sox effect list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub capture_device: String,
    pub output_device: String,
    pub passthrough_template: String,
    pub effects_template: String,
    /// Grace period between SIGTERM and SIGKILL when stopping a route
    pub stop_grace_ms: u64,
    /// How long a fresh route must stay alive to count as started
    pub settle_ms: u64,
    /// Watchdog poll interval
    pub watchdog_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_device: "plughw:3,0".into(),
            output_device: "plughw:3,0".into(),
            passthrough_template: format!(
                "arecord -D {{capture}} -f S16_LE -r 48000 -c 2 | sox -t wav - -t wav - {} | aplay -D {{output}}",
                PASSTHROUGH_EFFECTS
            ),
            effects_template:
                "arecord -D {capture} -f S16_LE -r 48000 -c 2 | sox -t wav - -t wav - {effects} | aplay -D {output}"
                    .into(),
            stop_grace_ms: 300,
            settle_ms: 100,
            watchdog_ms: 1000,
        }
    }
}

/// Announcement playback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Player argv for `.wav` files; the file path is appended
    pub wav_player: Vec<String>,
    /// Player argv for `.mp3` files; the file path is appended
    pub mp3_player: Vec<String>,
    pub timeout_secs: u64,
    /// Announcement played for a satellite field trigger
    pub field_trigger_sound: String,
    /// Announcement played for satellite motion
    pub motion_sound: String,
    /// Announcement played when a satellite reports low battery
    pub low_battery_sound: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            wav_player: vec!["aplay".into(), "-q".into()],
            mp3_player: vec!["mpg123".into(), "-q".into()],
            timeout_secs: STARTUP_SOUND_TIMEOUT_SECS,
            field_trigger_sound: "field_trigger.wav".into(),
            motion_sound: "motion_detected.wav".into(),
            low_battery_sound: "low_battery.wav".into(),
        }
    }
}

/// Physical device locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Run with null drivers even if devices are present
    pub disabled: bool,
    pub i2c_bus: u32,
    pub tuner_address: u16,
    /// Force mono FM reception
    pub tuner_mono: bool,
    /// LED class device names under `/sys/class/leds`
    pub sweep_led: String,
    pub box_led: String,
    pub led_class_dir: PathBuf,
    /// Longest a single driver call (I2C write, amixer run) may take
    pub io_timeout_ms: u64,
    pub mixer: MixerConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            i2c_bus: 1,
            tuner_address: TEA5767_ADDR,
            tuner_mono: false,
            sweep_led: "oraclebox:sweep".into(),
            box_led: "oraclebox:box".into(),
            led_class_dir: PathBuf::from("/sys/class/leds"),
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            mixer: MixerConfig::default(),
        }
    }
}

/// ALSA card and `amixer` control ids (`numid=N` or `name='...'`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub card: u32,
    /// Speaker playback switch, used for mute
    pub mute_control: String,
    pub speaker_volume_control: String,
    pub mic_volume_control: String,
    pub auto_gain_control: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            card: 3,
            mute_control: "numid=5".into(),
            speaker_volume_control: "numid=6".into(),
            mic_volume_control: "numid=8".into(),
            auto_gain_control: "numid=9".into(),
        }
    }
}

/// What to restore from the snapshot at boot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Resume the sweep if it was running at shutdown
    pub resume_sweep: bool,
    /// Start in the effects route if FX was enabled at shutdown
    pub resume_fx: bool,
    /// Play the configured startup announcement
    pub play_startup_sound: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [sweep]
            bounce = true

            [network]
            command_addr = "127.0.0.1:6000"

            [hardware.mixer]
            card = 1
            "#,
        )
        .unwrap();

        assert!(config.sweep.bounce);
        assert_eq!(config.sweep.min_khz, DEFAULT_SWEEP_MIN_KHZ);
        assert_eq!(config.network.command_addr.port(), 6000);
        assert_eq!(config.network.satellite_addr.port(), DEFAULT_SATELLITE_PORT);
        assert_eq!(config.hardware.mixer.card, 1);
        assert_eq!(config.hardware.mixer.mute_control, "numid=5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = AppConfig::default();
        config.sweep.min_khz = 108_000;
        config.sweep.max_khz = 88_000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_passthrough_template_has_placeholders() {
        let audio = AudioConfig::default();
        assert!(audio.passthrough_template.contains("{capture}"));
        assert!(audio.passthrough_template.contains("{output}"));
        assert!(audio.effects_template.contains("{effects}"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.leds.tick_ms, DEFAULT_LED_TICK_MS);
    }
}
