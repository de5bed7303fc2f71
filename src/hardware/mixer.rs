//! ALSA mixer control through `amixer`
//!
//! Every call runs `amixer` as a child with a deadline; a wedged card is
//! killed and reported as [`HardwareError::Timeout`] instead of holding the
//! caller.

use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::Mixer;
use crate::config::MixerConfig;
use crate::error::HardwareError;

/// How often a running `amixer` is checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One `MIXER SET` change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerSetting {
    /// 0..=`constants::SPEAKER_VOLUME_MAX`
    SpeakerVolume(u8),
    /// 0..=`constants::MIC_VOLUME_MAX`
    MicVolume(u8),
    AutoGain(bool),
}

impl MixerSetting {
    pub fn wire_name(self) -> &'static str {
        match self {
            MixerSetting::SpeakerVolume(_) => "SPEAKER_VOL",
            MixerSetting::MicVolume(_) => "MIC_VOL",
            MixerSetting::AutoGain(_) => "AUTO_GAIN",
        }
    }
}

/// `MIXER STATUS` payload. `None` means the control was not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MixerStatus {
    pub speaker_volume: Option<u32>,
    pub speaker_on: Option<bool>,
    pub mic_volume: Option<u32>,
    pub auto_gain: Option<bool>,
}

/// Speaker, mic and AGC controls on one sound card
pub struct AmixerMixer {
    config: MixerConfig,
    timeout: Duration,
}

impl AmixerMixer {
    pub fn new(config: MixerConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Read the mute control once to make sure the card and `amixer` exist
    pub fn check_card(&self) -> Result<(), HardwareError> {
        self.run(&["cget", self.config.mute_control.as_str()])
            .map(|_| ())
    }

    fn set_args(&self, muted: bool) -> [String; 2] {
        // The playback *switch* is on when audio flows, so mute = off.
        [
            self.config.mute_control.clone(),
            if muted { "off" } else { "on" }.into(),
        ]
    }

    fn setting_args(&self, setting: MixerSetting) -> [String; 2] {
        match setting {
            MixerSetting::SpeakerVolume(level) => {
                [self.config.speaker_volume_control.clone(), level.to_string()]
            }
            MixerSetting::MicVolume(level) => {
                [self.config.mic_volume_control.clone(), level.to_string()]
            }
            MixerSetting::AutoGain(on) => [
                self.config.auto_gain_control.clone(),
                if on { "on" } else { "off" }.into(),
            ],
        }
    }

    fn run(&self, rest: &[&str]) -> Result<String, HardwareError> {
        let card = self.config.card.to_string();
        let mut args = vec!["-c", card.as_str()];
        args.extend_from_slice(rest);

        let mut child = Command::new("amixer")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HardwareError::Mixer(format!("amixer: {}", e)))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("amixer {:?} timed out after {:?}", args, self.timeout);
                    return Err(HardwareError::Timeout);
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(HardwareError::Mixer(format!("amixer: {}", e))),
            }
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout);
        }
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr);
        }

        if !status.success() {
            return Err(HardwareError::Mixer(stderr.trim().to_string()));
        }
        Ok(stdout)
    }
}

impl Mixer for AmixerMixer {
    fn set_mute(&self, muted: bool) -> Result<(), HardwareError> {
        let [control, value] = self.set_args(muted);
        self.run(&["cset", &control, &value])?;
        tracing::info!("Speaker mute set to {}", muted);
        Ok(())
    }

    fn apply(&self, setting: MixerSetting) -> Result<(), HardwareError> {
        let [control, value] = self.setting_args(setting);
        self.run(&["cset", &control, &value])?;
        tracing::info!("Mixer {} set to {}", setting.wire_name(), value);
        Ok(())
    }

    fn status(&self) -> Result<MixerStatus, HardwareError> {
        let contents = parse_contents(&self.run(&["contents"])?);
        Ok(self.read_status(&contents))
    }
}

impl AmixerMixer {
    fn read_status(&self, contents: &HashMap<String, String>) -> MixerStatus {
        let value = |control: &str| {
            contents
                .iter()
                .find(|(header, _)| header.split(',').any(|part| part == control))
                .map(|(_, value)| value.clone())
        };
        let switch = |control: &str| value(control).map(|v| v == "on");
        let level = |control: &str| value(control).and_then(|v| v.parse().ok());

        MixerStatus {
            speaker_volume: level(&self.config.speaker_volume_control),
            speaker_on: switch(&self.config.mute_control),
            mic_volume: level(&self.config.mic_volume_control),
            auto_gain: switch(&self.config.auto_gain_control),
        }
    }
}

/// Control header line to its first value, from `amixer contents`
fn parse_contents(output: &str) -> HashMap<String, String> {
    let mut controls = HashMap::new();
    let mut header: Option<&str> = None;
    for line in output.lines() {
        if line.starts_with("numid=") {
            header = Some(line.trim());
        } else if let (Some(h), Some(values)) = (header, line.trim().strip_prefix(": values=")) {
            let first = values.split(',').next().unwrap_or_default().trim();
            controls.insert(h.to_string(), first.to_string());
        }
    }
    controls
}

/// Mixer used in "no hardware" mode
pub struct NullMixer;

impl Mixer for NullMixer {
    fn set_mute(&self, _muted: bool) -> Result<(), HardwareError> {
        Ok(())
    }

    fn apply(&self, _setting: MixerSetting) -> Result<(), HardwareError> {
        Ok(())
    }

    fn status(&self) -> Result<MixerStatus, HardwareError> {
        Ok(MixerStatus::default())
    }
}
