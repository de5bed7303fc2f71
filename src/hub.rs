//! Command dispatch
//!
//! [`Hub`] owns handles to every engine and turns a parsed [`Command`] into
//! exactly one [`Reply`]. Each handler either commits its whole change to
//! the shared record or leaves it untouched.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AudioError, Error, ProtocolError};
use crate::fx::{FxManager, SupervisorStatus};
use crate::hardware::{self, Hardware, HardwarePresence, Mixer};
use crate::ingest::{ActivityLog, DeviceClass};
use crate::protocol::{
    AlertCommand, Command, DirChange, FxCommand, LedField, MixerCommand, Reply, SoundCommand,
};
use crate::state::{Direction, HubState, LedChannel, LedMode, LedSettings, Speed, StateStore};
use crate::sweep::SweepEngine;
use crate::voice::Announcer;

/// `STATUS` payload
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub hub: HubState,
    pub leds: LedSettings,
    pub frequency_khz: u32,
    pub tuner_degraded: bool,
    pub sweep_led_degraded: bool,
    pub box_led_degraded: bool,
    pub fx_enabled: bool,
    pub fx_preset: String,
    pub audio: SupervisorStatus,
    pub hardware: HardwarePresence,
}

/// `PING` payload
#[derive(Debug, Clone, Serialize)]
struct PingReport<'a> {
    ok: bool,
    #[serde(flatten)]
    hub: &'a HubState,
}

#[derive(Debug, Clone, Serialize)]
struct SoundStatus {
    startup_sound: String,
    startup_exists: bool,
}

pub struct Hub {
    store: StateStore,
    sweep: SweepEngine,
    fx: Arc<FxManager>,
    announcer: Arc<Announcer>,
    activity: Arc<ActivityLog>,
    mixer: Arc<dyn Mixer>,
    presence: HardwarePresence,
    io_timeout: Duration,
}

impl Hub {
    pub fn new(
        store: StateStore,
        sweep: SweepEngine,
        fx: Arc<FxManager>,
        announcer: Arc<Announcer>,
        activity: Arc<ActivityLog>,
        hardware: &Hardware,
    ) -> Self {
        Self {
            store,
            sweep,
            fx,
            announcer,
            activity,
            mixer: hardware.mixer.clone(),
            presence: hardware.presence,
            io_timeout: hardware.io_timeout,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn sweep(&self) -> &SweepEngine {
        &self.sweep
    }

    /// Run one command
    pub async fn execute(&self, command: Command) -> Reply {
        tracing::debug!("Executing {:?}", command);
        match self.dispatch(command).await {
            Ok(payload) => Reply::Ok(payload),
            Err(e) => {
                tracing::debug!("Command failed: {}", e);
                Reply::Err(wire_reason(&e))
            }
        }
    }

    async fn dispatch(&self, command: Command) -> Result<String, Error> {
        match command {
            Command::Status => to_json(&self.status()),
            Command::Ping => self.store.read(|r| {
                to_json(&PingReport {
                    ok: true,
                    hub: &r.hub,
                })
            }),
            Command::Speed(ms) => Ok(self.set_speed(|_| Speed::from_ms(ms))),
            Command::Faster => Ok(self.set_speed(Speed::faster)),
            Command::Slower => Ok(self.set_speed(Speed::slower)),
            Command::Dir(change) => {
                let direction = self.store.commit(|r| {
                    r.hub.direction = match change {
                        DirChange::Up => Direction::Up,
                        DirChange::Down => Direction::Down,
                        DirChange::Toggle => r.hub.direction.toggled(),
                    };
                    r.hub.direction
                });
                Ok(format!("DIR {}", direction.as_str()))
            }
            Command::Start => {
                self.set_running(true);
                Ok("START".into())
            }
            Command::Stop => {
                self.set_running(false);
                Ok("STOP".into())
            }
            Command::Led(channel, mode) => {
                self.store.commit(|r| r.set_led_mode(channel, mode));
                Ok(format!("LED {} {}", channel.as_str(), mode))
            }
            Command::LedAllOff => {
                self.store.commit(|r| {
                    for channel in LedChannel::ALL {
                        r.set_led_mode(channel, LedMode::Off);
                    }
                });
                Ok("LED ALL OFF".into())
            }
            Command::LedConfig(channel, field, value) => {
                self.configure_led(channel, field, value)?;
                Ok(String::new())
            }
            Command::Mute(muted) => self.set_mute(muted).await,
            Command::Sound(sound) => self.sound_command(sound).await,
            Command::Fx(fx) => self.fx_command(fx).await,
            Command::Events(n) => Ok(format!("EVENTS {}", to_json(&self.activity.recent(n))?)),
            Command::Mixer(MixerCommand::Status) => {
                let mixer = self.mixer.clone();
                let status = hardware::bounded(self.io_timeout, move || mixer.status()).await?;
                Ok(format!("MIXER STATUS {}", to_json(&status)?))
            }
            Command::Mixer(MixerCommand::Set(setting)) => {
                let mixer = self.mixer.clone();
                hardware::bounded(self.io_timeout, move || mixer.apply(setting)).await?;
                Ok(format!("MIXER SET {}", setting.wire_name()))
            }
            Command::MicStatus => {
                let mixer = self.mixer.clone();
                let status = hardware::bounded(self.io_timeout, move || mixer.status()).await?;
                Ok(match status.mic_volume {
                    Some(level) => format!("MIC STATUS {}", level),
                    None => "MIC STATUS unknown".into(),
                })
            }
            Command::FmTune(khz) => {
                self.sweep.tune(khz, self.io_timeout).await?;
                Ok(format!("FM TUNE {}", f64::from(khz) / 1000.0))
            }
            Command::Alert(device, alert) => self.alert_command(device, alert),
        }
    }

    pub fn status(&self) -> StatusReport {
        let audio = self.fx.supervisor().status();
        self.store.read(|r| StatusReport {
            hub: r.hub.clone(),
            leds: r.leds,
            frequency_khz: r.runtime.frequency_khz,
            tuner_degraded: r.runtime.tuner_degraded,
            sweep_led_degraded: r.runtime.leds[LedChannel::Sweep.index()].degraded,
            box_led_degraded: r.runtime.leds[LedChannel::Box.index()].degraded,
            fx_enabled: r.fx.enabled,
            fx_preset: r.fx.preset.clone(),
            audio,
            hardware: self.presence,
        })
    }

    fn set_speed(&self, change: impl FnOnce(Speed) -> Speed) -> String {
        let speed = self.store.commit(|r| {
            r.hub.speed = change(r.hub.speed);
            r.hub.speed
        });
        self.sweep.wake();
        format!("SPEED {}", speed.ms())
    }

    fn set_running(&self, running: bool) {
        let changed = self.store.commit(|r| std::mem::replace(&mut r.hub.running, running) != running);
        if changed {
            tracing::info!("Sweep {}", if running { "started" } else { "stopped" });
        }
        self.sweep.wake();
    }

    fn configure_led(&self, channel: LedChannel, field: LedField, value: u8) -> Result<(), Error> {
        self.store.try_commit(|r| {
            let settings = r.leds.channel_mut(channel);
            match field {
                LedField::Min if value > settings.max_brightness => {
                    return Err(ProtocolError::Usage("min > max".into()))
                }
                LedField::Max if value < settings.min_brightness => {
                    return Err(ProtocolError::Usage("min > max".into()))
                }
                LedField::Min => settings.min_brightness = value,
                LedField::Max => settings.max_brightness = value,
                LedField::Speed => settings.speed = value,
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn set_mute(&self, muted: bool) -> Result<String, Error> {
        let mixer = self.mixer.clone();
        hardware::bounded(self.io_timeout, move || mixer.set_mute(muted)).await?;
        self.store.commit(|r| r.hub.muted = muted);
        Ok(format!("MUTE {}", if muted { "ON" } else { "OFF" }))
    }

    fn alert_command(&self, device: DeviceClass, command: AlertCommand) -> Result<String, Error> {
        let library = self.announcer.library();
        match command {
            AlertCommand::Sound(name) => {
                library.resolve(&name)?;
                self.store.commit(|r| *r.hub.alert_sound_mut(device) = name.clone());
                Ok(format!("{} SOUND {}", device.verb(), name))
            }
            AlertCommand::Sounds => {
                let names = library.list(Some(device.sound_folder()))?;
                Ok(format!("{} SOUNDS {}", device.verb(), to_json(&names)?))
            }
        }
    }

    async fn sound_command(&self, command: SoundCommand) -> Result<String, Error> {
        let library = self.announcer.library();
        match command {
            SoundCommand::List(folder) => {
                let names = library.list(folder.as_deref())?;
                Ok(format!("SOUND LIST {}", to_json(&names)?))
            }
            SoundCommand::Play(name) => {
                self.announcer.spawn_play(name)?;
                Ok("SOUND PLAY".into())
            }
            SoundCommand::Set(name) => {
                library.resolve(&name)?;
                self.store.commit(|r| r.hub.startup_sound = name.clone());
                Ok(format!("SOUND SET {}", name))
            }
            SoundCommand::Clear => {
                self.store.commit(|r| r.hub.startup_sound.clear());
                Ok("SOUND CLEAR".into())
            }
            SoundCommand::Status => {
                let startup_sound = self.announcer.startup_sound().unwrap_or_default();
                let startup_exists = !startup_sound.is_empty() && library.exists(&startup_sound);
                let status = SoundStatus {
                    startup_sound,
                    startup_exists,
                };
                Ok(format!("SOUND STATUS {}", to_json(&status)?))
            }
        }
    }

    async fn fx_command(&self, command: FxCommand) -> Result<String, Error> {
        match command {
            FxCommand::Enable => {
                self.fx.enable().await?;
                Ok("FX ENABLED".into())
            }
            FxCommand::Disable => {
                self.fx.disable().await?;
                Ok("FX DISABLED".into())
            }
            FxCommand::Status => Ok(format!("FX STATUS {}", to_json(&self.fx.status())?)),
            FxCommand::Set(field, value) => {
                let stored = self.fx.set_field(field, value).await?;
                Ok(format!("FX SET {} {}", field.wire_name(), stored))
            }
            FxCommand::PresetList => {
                let list = self.store.read(|r| to_json(&r.catalog.summaries()))?;
                Ok(format!("FX PRESET LIST {}", list))
            }
            FxCommand::PresetInfo(name) => {
                let preset = self.fx.preset(&name).ok_or(ProtocolError::BadValue {
                    field: "FX PRESET".into(),
                    value: name,
                })?;
                Ok(format!("FX PRESET INFO {}", to_json(&preset)?))
            }
            FxCommand::PresetSet(name) => {
                let name = self.fx.apply_preset(&name).await?;
                Ok(format!("FX PRESET SET {}", name))
            }
            FxCommand::PresetSave(name, category) => {
                let name = self.fx.save_preset(&name, category).await?;
                Ok(format!("FX PRESET SAVED {}", name))
            }
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::Config(format!("serialize: {}", e)))
}

/// Text after `ERR ` for a failed command
fn wire_reason(error: &Error) -> String {
    match error {
        Error::Protocol(e) => e.to_string(),
        Error::Audio(AudioError::Busy) => "busy".into(),
        Error::Audio(e) => e.to_string(),
        Error::Voice(e) => e.to_string(),
        Error::Hardware(e) => e.to_string(),
        Error::Ingest(e) => e.to_string(),
        Error::Store(e) => e.to_string(),
        Error::Config(e) => e.clone(),
        Error::Io(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, SweepConfig, VoiceConfig};
    use crate::fx::AudioSupervisor;
    use crate::hardware::testing::{RecordingMixer, RecordingTuner};
    use crate::protocol::parse;
    use crate::voice::SoundLibrary;
    use std::sync::atomic::Ordering;
    use tokio::sync::watch;

    struct Fixture {
        hub: Hub,
        mixer: Arc<RecordingMixer>,
        tuner: Arc<RecordingTuner>,
        _sounds: tempfile::TempDir,
        _shutdown: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let sounds = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(sounds.path().join("Startup")).unwrap();
        std::fs::write(sounds.path().join("Startup/hello.wav"), b"RIFF").unwrap();
        std::fs::create_dir_all(sounds.path().join("RemPod")).unwrap();
        std::fs::write(sounds.path().join("RemPod/chime.wav"), b"RIFF").unwrap();

        let store = StateStore::in_memory();
        let (supervisor, _) = AudioSupervisor::spawn(AudioConfig {
            passthrough_template: "exec sleep 30".into(),
            effects_template: "exec sleep 31 # {effects}".into(),
            stop_grace_ms: 500,
            settle_ms: 30,
            watchdog_ms: 1000,
            ..AudioConfig::default()
        });
        let fx = Arc::new(FxManager::new(store.clone(), supervisor.clone()));
        let voice = VoiceConfig {
            wav_player: vec!["true".into()],
            ..VoiceConfig::default()
        };
        let announcer = Arc::new(Announcer::new(
            SoundLibrary::new(sounds.path()),
            voice,
            supervisor,
            store.clone(),
        ));
        let (tx, rx) = watch::channel(false);
        let tuner = Arc::new(RecordingTuner::default());
        let (sweep, _) = SweepEngine::spawn(
            store.clone(),
            tuner.clone(),
            SweepConfig::default(),
            None,
            rx,
        );

        let mixer = Arc::new(RecordingMixer::default());
        let mut hardware = Hardware::null();
        hardware.mixer = mixer.clone();
        hardware.io_timeout = Duration::from_millis(300);

        let hub = Hub::new(
            store,
            sweep,
            fx,
            announcer,
            Arc::new(ActivityLog::new(16, None)),
            &hardware,
        );
        Fixture {
            hub,
            mixer,
            tuner,
            _sounds: sounds,
            _shutdown: tx,
        }
    }

    async fn run(hub: &Hub, line: &str) -> String {
        match parse(line) {
            Ok(command) => hub.execute(command).await.to_string(),
            Err(e) => Reply::from(e).to_string(),
        }
    }

    #[tokio::test]
    async fn test_speed_snaps_and_reports() {
        let f = fixture();
        assert_eq!(run(&f.hub, "SPEED 160").await, "OK SPEED 150");
        assert_eq!(run(&f.hub, "SLOWER").await, "OK SPEED 200");
        assert_eq!(run(&f.hub, "DIR TOGGLE").await, "OK DIR DOWN");
        assert_eq!(f.hub.status().hub.speed.ms(), 200);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_loop() {
        let f = fixture();
        assert_eq!(run(&f.hub, "START").await, "OK START");
        assert_eq!(run(&f.hub, "START").await, "OK START");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(f.hub.status().hub.running);
        assert_eq!(f.hub.sweep().active_loops(), 1);

        let status: serde_json::Value =
            serde_json::from_str(run(&f.hub, "STATUS").await.strip_prefix("OK ").unwrap()).unwrap();
        assert_eq!(status["running"], true);
        assert_eq!(status["speed_ms"], f.hub.status().hub.speed.ms());
    }

    #[tokio::test]
    async fn test_led_commands() {
        let f = fixture();
        assert_eq!(run(&f.hub, "LED box strobe").await, "OK LED BOX strobe");
        assert_eq!(run(&f.hub, "LED ALL OFF").await, "OK LED ALL OFF");
        let hub = f.hub.status().hub;
        assert_eq!(hub.sweep_led_mode, LedMode::Off);
        assert_eq!(hub.box_led_mode, LedMode::Off);

        assert_eq!(run(&f.hub, "BOX_CFG MAX 100").await, "OK");
        assert_eq!(run(&f.hub, "BOX_CFG MIN 120").await, "ERR min > max");
        assert_eq!(f.hub.status().leds.box_led.min_brightness, 0);
        assert_eq!(run(&f.hub, "SWEEP_CFG SPEED 7").await, "OK");
        assert_eq!(f.hub.status().leds.sweep.speed, 7);
    }

    #[tokio::test]
    async fn test_mute_commits_only_on_success() {
        let f = fixture();
        assert_eq!(run(&f.hub, "MUTE ON").await, "OK MUTE ON");
        assert!(f.hub.status().hub.muted);

        f.mixer.failing.store(true, Ordering::SeqCst);
        assert!(run(&f.hub, "MUTE OFF").await.starts_with("ERR "));
        assert!(f.hub.status().hub.muted);
        assert_eq!(*f.mixer.calls.lock(), [true]);
    }

    #[tokio::test]
    async fn test_stalled_mixer_times_out() {
        let f = fixture();
        f.mixer.stall_ms.store(2000, Ordering::SeqCst);

        let started = std::time::Instant::now();
        assert_eq!(run(&f.hub, "MUTE ON").await, "ERR Hardware operation timed out");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!f.hub.status().hub.muted);

        assert_eq!(run(&f.hub, "MIXER STATUS").await, "ERR Hardware operation timed out");
    }

    #[tokio::test]
    async fn test_mixer_commands() {
        let f = fixture();
        assert_eq!(run(&f.hub, "MIXER SET SPEAKER_VOL 20").await, "OK MIXER SET SPEAKER_VOL");
        assert_eq!(run(&f.hub, "MIXER SET MIC_VOL 15").await, "OK MIXER SET MIC_VOL");
        assert_eq!(run(&f.hub, "MIXER SET AUTO_GAIN OFF").await, "OK MIXER SET AUTO_GAIN");
        assert_eq!(
            run(&f.hub, "MIXER STATUS").await,
            r#"OK MIXER STATUS {"speaker_volume":20,"speaker_on":null,"mic_volume":15,"auto_gain":false}"#
        );
        assert_eq!(run(&f.hub, "MIC STATUS").await, "OK MIC STATUS 15");

        f.mixer.failing.store(true, Ordering::SeqCst);
        assert!(run(&f.hub, "MIXER SET SPEAKER_VOL 5").await.starts_with("ERR "));
    }

    #[tokio::test]
    async fn test_fm_tune() {
        let f = fixture();
        assert_eq!(run(&f.hub, "FM TUNE 101.1").await, "OK FM TUNE 101.1");
        assert_eq!(f.hub.status().frequency_khz, 101_100);
        assert_eq!(f.tuner.writes.lock().last(), Some(&101_100));

        assert_eq!(run(&f.hub, "START").await, "OK START");
        assert_eq!(
            run(&f.hub, "FM TUNE 95.0").await,
            "ERR FM TUNE not allowed while sweeping"
        );
    }

    #[tokio::test]
    async fn test_alert_sound_selection() {
        let f = fixture();
        assert!(run(&f.hub, "REMPOD SOUND missing.wav").await.starts_with("ERR "));
        assert_eq!(run(&f.hub, "REMPOD SOUND chime.wav").await, "OK REMPOD SOUND chime.wav");
        assert_eq!(f.hub.status().hub.rempod_sound, "chime.wav");
        assert_eq!(f.hub.status().hub.musicbox_sound, "");
        assert_eq!(run(&f.hub, "REMPOD SOUNDS").await, r#"OK REMPOD SOUNDS ["chime.wav"]"#);
    }

    #[tokio::test]
    async fn test_sound_set_requires_existing_file() {
        let f = fixture();
        assert!(run(&f.hub, "SOUND SET missing.wav").await.starts_with("ERR "));
        assert_eq!(run(&f.hub, "SOUND SET hello.wav").await, "OK SOUND SET hello.wav");
        assert_eq!(
            run(&f.hub, "SOUND STATUS").await,
            r#"OK SOUND STATUS {"startup_sound":"hello.wav","startup_exists":true}"#
        );
        assert_eq!(
            run(&f.hub, "SOUND LIST").await,
            r#"OK SOUND LIST ["chime.wav","hello.wav"]"#
        );
        assert_eq!(run(&f.hub, "SOUND CLEAR").await, "OK SOUND CLEAR");
        assert_eq!(f.hub.status().hub.startup_sound, "");
    }

    #[tokio::test]
    async fn test_fx_preset_and_set() {
        let f = fixture();
        assert_eq!(
            run(&f.hub, "FX PRESET SET SB7_CLASSIC").await,
            "OK FX PRESET SET SB7_CLASSIC"
        );
        assert_eq!(run(&f.hub, "FX SET BP_LOW 700.4").await, "OK FX SET BP_LOW 700");
        let reply = run(&f.hub, "FX STATUS").await;
        let status: serde_json::Value =
            serde_json::from_str(reply.strip_prefix("OK FX STATUS ").unwrap()).unwrap();
        assert_eq!(status["preset"], "CUSTOM");
        assert_eq!(status["bp_low"], 700);

        assert!(run(&f.hub, "FX PRESET SET NOPE").await.starts_with("ERR "));
        assert!(run(&f.hub, "FX PRESET INFO FM_DEEP_VOICE").await.starts_with("OK FX PRESET INFO {"));
        assert_eq!(
            run(&f.hub, "FX PRESET SAVE mine sb7").await,
            "OK FX PRESET SAVED MINE"
        );
        f.hub.fx.supervisor().shutdown().await;
    }

    #[tokio::test]
    async fn test_transition_while_paused_is_busy() {
        let f = fixture();
        f.hub.fx.start_current().await.unwrap();
        f.hub.fx.supervisor().pause().await.unwrap();
        assert_eq!(run(&f.hub, "FX ENABLE").await, "ERR busy");
        assert!(!f.hub.status().fx_enabled);
        f.hub.fx.supervisor().resume().await.unwrap();
        assert_eq!(run(&f.hub, "FX ENABLE").await, "OK FX ENABLED");
        f.hub.fx.supervisor().shutdown().await;
    }

    #[tokio::test]
    async fn test_events_empty() {
        let f = fixture();
        assert_eq!(run(&f.hub, "EVENTS").await, "OK EVENTS []");
    }
}
