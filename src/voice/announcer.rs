//! Announcement playback
//!
//! Announcements share the sound card with the live route. Each one waits
//! its turn in the queue, pauses the route's process group, plays, and
//! resumes the route, so exactly one thing ever writes to the device.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::library::{player_command, SoundLibrary};
use crate::config::VoiceConfig;
use crate::error::{AudioError, Error, VoiceError};
use crate::fx::AudioSupervisor;
use crate::ingest::{DeviceClass, EventKind};
use crate::state::StateStore;

pub struct Announcer {
    library: SoundLibrary,
    config: VoiceConfig,
    supervisor: AudioSupervisor,
    store: StateStore,

    /// Held for the whole of one announcement
    queue: Mutex<()>,
}

impl Announcer {
    pub fn new(
        library: SoundLibrary,
        config: VoiceConfig,
        supervisor: AudioSupervisor,
        store: StateStore,
    ) -> Self {
        Self {
            library,
            config,
            supervisor,
            store,
            queue: Mutex::new(()),
        }
    }

    pub fn library(&self) -> &SoundLibrary {
        &self.library
    }

    /// Configured startup announcement, if any
    pub fn startup_sound(&self) -> Option<String> {
        let name = self.store.read(|r| r.hub.startup_sound.clone());
        (!name.is_empty()).then_some(name)
    }

    /// Sound for `name`, or the startup sound when `name` is `None`
    pub fn resolve(&self, name: Option<&str>) -> Result<PathBuf, VoiceError> {
        match name {
            Some(name) => self.library.resolve(name),
            None => {
                let name = self.startup_sound().ok_or(VoiceError::NoStartupSound)?;
                self.library.resolve(&name)
            }
        }
    }

    /// Play one sound and wait for it to finish
    pub async fn play(&self, name: Option<&str>) -> Result<(), Error> {
        let path = self.resolve(name)?;
        let argv = player_command(&path, &self.config)?;

        let _turn = self.queue.lock().await;
        let paused = match self.supervisor.pause().await {
            Ok(paused) => paused,
            Err(AudioError::SupervisorGone) => false,
            Err(e) => return Err(e.into()),
        };
        if paused {
            tracing::debug!("Route paused for {}", path.display());
        }

        let result = self.run_player(&argv).await;

        if let Err(e) = self.supervisor.resume().await {
            tracing::warn!("Could not resume audio route: {}", e);
        }
        result.map_err(Error::from)
    }

    /// Validate now, play in the background
    pub fn spawn_play(self: &Arc<Self>, name: Option<String>) -> Result<(), VoiceError> {
        let path = self.resolve(name.as_deref())?;
        player_command(&path, &self.config)?;

        let announcer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = announcer.play(name.as_deref()).await {
                tracing::warn!("Announcement failed: {}", e);
            }
        });
        Ok(())
    }

    /// Queue the announcement configured for a satellite event
    pub fn announce_event(self: &Arc<Self>, device: DeviceClass, kind: EventKind) {
        let Some(sound) = self.sound_for(device, kind) else {
            return;
        };
        if let Err(e) = self.spawn_play(Some(sound)) {
            tracing::warn!("No announcement for {:?} {:?}: {}", device, kind, e);
        }
    }

    /// The device's selected alert for triggers and motion, otherwise the
    /// configured sound for the event kind
    pub fn sound_for(&self, device: DeviceClass, kind: EventKind) -> Option<String> {
        let sound = match kind {
            EventKind::FieldTrigger | EventKind::Motion => {
                let selected = self.store.read(|r| r.hub.alert_sound(device).to_string());
                if !selected.is_empty() {
                    return Some(selected);
                }
                if kind == EventKind::Motion {
                    &self.config.motion_sound
                } else {
                    &self.config.field_trigger_sound
                }
            }
            EventKind::LowBattery => &self.config.low_battery_sound,
            EventKind::TempDeviation => return None,
        };
        (!sound.is_empty()).then(|| sound.clone())
    }

    async fn run_player(&self, argv: &[String]) -> Result<(), VoiceError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| VoiceError::Player("empty player command".into()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(output) => output.map_err(|e| VoiceError::Player(format!("{}: {}", program, e)))?,
            Err(_) => {
                tracing::warn!("{} timed out after {}s", program, self.config.timeout_secs);
                return Err(VoiceError::Timeout(self.config.timeout_secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Player(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::fx::Route;

    fn fixture(player: &[&str], timeout_secs: u64) -> (tempfile::TempDir, Arc<Announcer>, AudioSupervisor) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Announcements")).unwrap();
        std::fs::write(dir.path().join("Announcements/field_trigger.wav"), b"RIFF").unwrap();

        let (supervisor, _handle) = AudioSupervisor::spawn(AudioConfig {
            passthrough_template: "exec sleep 30".into(),
            settle_ms: 20,
            ..AudioConfig::default()
        });
        let voice = VoiceConfig {
            wav_player: player.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
            ..VoiceConfig::default()
        };
        let announcer = Arc::new(Announcer::new(
            SoundLibrary::new(dir.path()),
            voice,
            supervisor.clone(),
            StateStore::in_memory(),
        ));
        (dir, announcer, supervisor)
    }

    #[tokio::test]
    async fn test_route_paused_during_playback() {
        let (_dir, announcer, supervisor) = fixture(&["sh", "-c", "sleep 0.4", "player"], 5);
        supervisor.start(Route::Passthrough).await.unwrap();

        let playing = tokio::spawn({
            let announcer = announcer.clone();
            async move { announcer.play(Some("field_trigger.wav")).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(supervisor.status().paused);

        playing.await.unwrap().unwrap();
        assert!(!supervisor.status().paused);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_player_timeout_still_resumes() {
        let (_dir, announcer, supervisor) = fixture(&["sh", "-c", "sleep 5", "player"], 1);
        supervisor.start(Route::Passthrough).await.unwrap();

        let err = announcer.play(Some("field_trigger.wav")).await.unwrap_err();
        assert!(matches!(err, Error::Voice(VoiceError::Timeout(1))));
        assert!(!supervisor.status().paused);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_startup_sound() {
        let (_dir, announcer, _supervisor) = fixture(&["true"], 5);
        assert!(matches!(
            announcer.spawn_play(None),
            Err(VoiceError::NoStartupSound)
        ));
        assert!(matches!(
            announcer.spawn_play(Some("nope.wav".into())),
            Err(VoiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_event_sounds() {
        let (_dir, announcer, _supervisor) = fixture(&["true"], 5);
        let (rempod, musicbox) = (DeviceClass::Rempod, DeviceClass::Musicbox);
        // temperature drift is logged but never announced
        assert_eq!(announcer.sound_for(rempod, EventKind::TempDeviation), None);
        assert_eq!(
            announcer.sound_for(musicbox, EventKind::Motion).as_deref(),
            Some("motion_detected.wav")
        );
        assert_eq!(
            announcer.sound_for(rempod, EventKind::FieldTrigger).as_deref(),
            Some("field_trigger.wav")
        );

        announcer.store.commit(|r| r.hub.rempod_sound = "chime.wav".into());
        assert_eq!(
            announcer.sound_for(rempod, EventKind::FieldTrigger).as_deref(),
            Some("chime.wav")
        );
        assert_eq!(
            announcer.sound_for(rempod, EventKind::LowBattery).as_deref(),
            Some("low_battery.wav")
        );
        assert_eq!(
            announcer.sound_for(musicbox, EventKind::Motion).as_deref(),
            Some("motion_detected.wav")
        );
    }
}
