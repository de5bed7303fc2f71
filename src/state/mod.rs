//! Shared hub record
//!
//! Everything the command handlers and engines share lives in one
//! [`HubRecord`] behind a single lock. The lock is held only while a closure
//! reads or mutates the record; hardware writes, process spawns and snapshot
//! writes all happen after it is released, on copied values.
//!
//! Persisted parts (hub settings, LED settings, FX parameters, user presets)
//! are written to a JSON snapshot after every committed mutation. Runtime
//! bookkeeping (current frequency, degraded flags, animation phase) is never
//! persisted.

pub mod model;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::BootConfig;
use crate::error::StoreError;
use crate::fx::params::FxParameters;
use crate::fx::presets::{FxPreset, PresetCatalog};

pub use model::{ChannelSettings, Direction, HubState, LedChannel, LedMode, LedSettings, Speed};

/// Everything the daemon shares
#[derive(Debug, Clone)]
pub struct HubRecord {
    pub hub: HubState,
    pub leds: LedSettings,
    pub fx: FxParameters,
    pub catalog: PresetCatalog,
    pub runtime: Runtime,
}

impl HubRecord {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            hub: snapshot.hub,
            leds: snapshot.leds,
            fx: snapshot.fx,
            catalog: PresetCatalog::with_user_presets(snapshot.presets),
            runtime: Runtime::default(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            hub: self.hub.clone(),
            leds: self.leds,
            fx: self.fx.clone(),
            presets: self.catalog.entries().to_vec(),
        }
    }

    /// Change a channel's mode and restart its animation phase
    pub fn set_led_mode(&mut self, channel: LedChannel, mode: LedMode) {
        self.hub.set_led_mode(channel, mode);
        self.runtime.leds[channel.index()].mode_since = Instant::now();
    }
}

impl Default for HubRecord {
    fn default() -> Self {
        Self::from_snapshot(Snapshot::default())
    }
}

/// Non-persisted state the engines keep next to the settings
#[derive(Debug, Clone)]
pub struct Runtime {
    /// Last frequency written (or attempted) to the tuner
    pub frequency_khz: u32,
    pub tuner_failures: u32,
    pub tuner_degraded: bool,
    pub last_sweep_step: Option<Instant>,
    pub leds: [ChannelRuntime; 2],
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            frequency_khz: 0,
            tuner_failures: 0,
            tuner_degraded: false,
            last_sweep_step: None,
            leds: [ChannelRuntime::default(), ChannelRuntime::default()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelRuntime {
    /// When the current mode was selected; animation phase starts here
    pub mode_since: Instant,
    pub degraded: bool,
}

impl Default for ChannelRuntime {
    fn default() -> Self {
        Self {
            mode_since: Instant::now(),
            degraded: false,
        }
    }
}

/// On-disk form of the persisted state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub hub: HubState,
    #[serde(default)]
    pub leds: LedSettings,
    #[serde(default)]
    pub fx: FxParameters,
    /// Full catalog, built-in entries flagged
    #[serde(default)]
    pub presets: Vec<FxPreset>,
}

impl Snapshot {
    /// Read a snapshot; `Ok(None)` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)
    }
}

struct Inner {
    record: Mutex<HubRecord>,
    path: Option<PathBuf>,
    /// Bumped on every committed mutation
    generation: AtomicU64,
    /// Generation of the last snapshot written; serializes writers
    written: Mutex<u64>,
}

/// Handle to the shared record. Cheap to clone.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    /// Load the snapshot at `path`, or start from defaults if it is missing
    /// or unreadable.
    pub fn open(path: &Path) -> Self {
        let record = match Snapshot::load(path) {
            Ok(Some(snapshot)) => {
                tracing::info!("Loaded state from {}", path.display());
                HubRecord::from_snapshot(snapshot)
            }
            Ok(None) => {
                tracing::info!("No state at {}, using defaults", path.display());
                HubRecord::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable state: {}", e);
                HubRecord::default()
            }
        };
        Self::with_record(record, Some(path.to_path_buf()))
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::with_record(HubRecord::default(), None)
    }

    fn with_record(record: HubRecord, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                record: Mutex::new(record),
                path,
                generation: AtomicU64::new(0),
                written: Mutex::new(0),
            }),
        }
    }

    /// Run `f` with shared access to the record
    pub fn read<T>(&self, f: impl FnOnce(&HubRecord) -> T) -> T {
        f(&self.inner.record.lock())
    }

    /// Mutate the record and persist the result
    pub fn commit<T>(&self, f: impl FnOnce(&mut HubRecord) -> T) -> T {
        let (out, snapshot, generation) = {
            let mut record = self.inner.record.lock();
            let out = f(&mut record);
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (out, record.snapshot(), generation)
        };
        self.persist(snapshot, generation);
        out
    }

    /// Mutate a draft copy; the record changes (and is persisted) only if
    /// `f` succeeds.
    pub fn try_commit<T, E>(&self, f: impl FnOnce(&mut HubRecord) -> Result<T, E>) -> Result<T, E> {
        let (out, snapshot, generation) = {
            let mut record = self.inner.record.lock();
            let mut draft = record.clone();
            let out = f(&mut draft)?;
            *record = draft;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (out, record.snapshot(), generation)
        };
        self.persist(snapshot, generation);
        Ok(out)
    }

    /// Update runtime bookkeeping without writing a snapshot
    pub fn update_runtime<T>(&self, f: impl FnOnce(&mut Runtime) -> T) -> T {
        f(&mut self.inner.record.lock().runtime)
    }

    /// Mutate the record without writing a snapshot. Engine-driven changes
    /// go through here and reach the disk with the next commit or flush.
    pub fn update<T>(&self, f: impl FnOnce(&mut HubRecord) -> T) -> T {
        f(&mut self.inner.record.lock())
    }

    /// Write the current record unconditionally (used at shutdown)
    pub fn flush(&self) {
        let (snapshot, generation) = {
            let record = self.inner.record.lock();
            (record.snapshot(), self.inner.generation.load(Ordering::SeqCst))
        };
        self.write(snapshot, generation, true);
    }

    /// Apply the boot policy: the sweep and the effects route only resume
    /// if configured to.
    pub fn apply_boot_policy(&self, boot: &BootConfig) {
        self.commit(|record| {
            if !boot.resume_sweep {
                record.hub.running = false;
            }
            if !boot.resume_fx {
                record.fx.enabled = false;
            }
        });
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    fn persist(&self, snapshot: Snapshot, generation: u64) {
        self.write(snapshot, generation, false);
    }

    fn write(&self, snapshot: Snapshot, generation: u64, force: bool) {
        let Some(path) = self.inner.path.as_deref() else {
            return;
        };
        let mut written = self.inner.written.lock();
        // A newer commit already reached the disk
        if !force && *written >= generation {
            return;
        }
        match snapshot.save(path) {
            Ok(()) => *written = generation.max(*written),
            Err(e) => tracing::error!("State not saved: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::params::FxField;
    use crate::fx::presets::PresetCategory;

    #[test]
    fn test_try_commit_failure_leaves_record() {
        let store = StateStore::in_memory();
        let result: Result<(), &str> = store.try_commit(|r| {
            r.hub.running = true;
            Err("nope")
        });
        assert!(result.is_err());
        assert!(!store.read(|r| r.hub.running));
    }

    #[test]
    fn test_snapshot_round_trip_with_user_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path);
        store.commit(|r| {
            r.hub.speed = Speed::from_ms(300);
            r.hub.direction = Direction::Down;
            r.hub.startup_sound = "Startup/hello.wav".into();
            r.leds.box_led.max_brightness = 90;
            r.fx.set_field(FxField::ReverbWet, 12.0).unwrap();
        });
        store
            .try_commit(|r| {
                let values = r.fx.values;
                r.catalog.save("CELLAR", PresetCategory::Sb7, values).map(|_| ())
            })
            .unwrap();

        let reopened = StateStore::open(&path);
        let (before, after) = (store.read(|r| r.clone()), reopened.read(|r| r.clone()));
        assert_eq!(after.hub, before.hub);
        assert_eq!(after.leds, before.leds);
        assert_eq!(after.fx, before.fx);
        assert_eq!(after.catalog, before.catalog);
        assert_eq!(after.catalog.get("CELLAR").unwrap().values.reverb_wet, 12);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::open(&path);
        assert_eq!(store.read(|r| r.hub.clone()), HubState::default());
    }

    #[test]
    fn test_boot_policy_resets_running_and_fx() {
        let store = StateStore::in_memory();
        store.commit(|r| {
            r.hub.running = true;
            r.fx.enabled = true;
        });

        store.apply_boot_policy(&BootConfig {
            resume_sweep: true,
            ..BootConfig::default()
        });
        assert!(store.read(|r| r.hub.running));
        assert!(!store.read(|r| r.fx.enabled));
    }

    #[test]
    fn test_runtime_updates_do_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path);
        store.update_runtime(|rt| rt.frequency_khz = 99_900);
        assert!(!path.exists());
        assert_eq!(store.read(|r| r.runtime.frequency_khz), 99_900);
    }
}
