//! Effects manager
//!
//! Ties the persisted FX parameters to the running route. Every transition
//! takes the transition lock, so concurrent requests queue up instead of
//! interleaving, and the record only changes once the supervisor has the
//! matching route running.

use serde::Serialize;
use tokio::sync::Mutex;

use super::params::{FxField, FxParameters};
use super::pipeline::Route;
use super::presets::{FxPreset, PresetCategory};
use super::supervisor::{AudioSupervisor, SupervisorStatus};
use crate::error::{Error, ProtocolError};
use crate::state::StateStore;

/// `FX STATUS` payload
#[derive(Debug, Clone, Serialize)]
pub struct FxStatus {
    #[serde(flatten)]
    pub params: FxParameters,
    pub audio: SupervisorStatus,
}

pub struct FxManager {
    store: StateStore,
    supervisor: AudioSupervisor,
    transition: Mutex<()>,
}

impl FxManager {
    pub fn new(store: StateStore, supervisor: AudioSupervisor) -> Self {
        Self {
            store,
            supervisor,
            transition: Mutex::new(()),
        }
    }

    pub fn supervisor(&self) -> &AudioSupervisor {
        &self.supervisor
    }

    /// Start whichever route the persisted flag asks for (used at boot).
    /// Falls back to passthrough, clearing the flag, if effects won't start.
    pub async fn start_current(&self) -> Result<(), Error> {
        let _guard = self.transition.lock().await;
        let fx = self.store.read(|r| r.fx.clone());
        match self.supervisor.start(route_for(&fx)).await {
            Ok(()) => Ok(()),
            Err(e) if fx.enabled => {
                tracing::warn!("Effects route failed at boot, using passthrough: {}", e);
                self.store.commit(|r| r.fx.enabled = false);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn enable(&self) -> Result<(), Error> {
        self.set_enabled(true).await
    }

    pub async fn disable(&self) -> Result<(), Error> {
        self.set_enabled(false).await
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), Error> {
        let _guard = self.transition.lock().await;
        let mut fx = self.store.read(|r| r.fx.clone());
        fx.enabled = enabled;

        self.supervisor.start(route_for(&fx)).await?;
        self.store.commit(|r| r.fx.enabled = enabled);
        tracing::info!("Effects {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Change one parameter; restarts the effects route if it is active.
    /// Returns the stored (rounded) value.
    pub async fn set_field(&self, field: FxField, value: f64) -> Result<i32, Error> {
        let _guard = self.transition.lock().await;
        let mut fx = self.store.read(|r| r.fx.clone());
        let stored = fx.set_field(field, value)?;

        if fx.enabled {
            self.supervisor.start(route_for(&fx)).await?;
        }
        self.store.commit(|r| r.fx = fx);
        Ok(stored)
    }

    /// Load all nine values from a catalog entry; returns its canonical name
    pub async fn apply_preset(&self, name: &str) -> Result<String, Error> {
        let _guard = self.transition.lock().await;
        let (mut fx, preset) = self.store.read(|r| (r.fx.clone(), r.catalog.get(name).cloned()));
        let preset = preset.ok_or_else(|| ProtocolError::BadValue {
            field: "FX PRESET".into(),
            value: name.to_string(),
        })?;
        fx.apply_preset(&preset.name, preset.values);

        if fx.enabled {
            self.supervisor.start(route_for(&fx)).await?;
        }
        self.store.commit(|r| r.fx = fx);
        tracing::info!("Applied preset {}", preset.name);
        Ok(preset.name)
    }

    /// Save the live values as a user preset and make it the active label
    pub async fn save_preset(&self, name: &str, category: PresetCategory) -> Result<String, Error> {
        let _guard = self.transition.lock().await;
        let saved = self.store.try_commit(|r| {
            let values = r.fx.values;
            let saved = r.catalog.save(name, category, values)?.name.clone();
            r.fx.preset = saved.clone();
            Ok::<_, ProtocolError>(saved)
        })?;
        tracing::info!("Saved preset {} ({})", saved, category);
        Ok(saved)
    }

    pub fn status(&self) -> FxStatus {
        FxStatus {
            params: self.store.read(|r| r.fx.clone()),
            audio: self.supervisor.status(),
        }
    }

    pub fn preset(&self, name: &str) -> Option<FxPreset> {
        self.store.read(|r| r.catalog.get(name).cloned())
    }
}

fn route_for(fx: &FxParameters) -> Route {
    if fx.enabled {
        Route::Effects(fx.values)
    } else {
        Route::Passthrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::constants::CUSTOM_PRESET;
    use crate::fx::pipeline::RouteKind;
    use std::sync::Arc;

    fn manager_with(config: AudioConfig) -> (Arc<FxManager>, StateStore) {
        let store = StateStore::in_memory();
        let (supervisor, _handle) = AudioSupervisor::spawn(config);
        (Arc::new(FxManager::new(store.clone(), supervisor)), store)
    }

    fn sleeping_routes() -> AudioConfig {
        AudioConfig {
            passthrough_template: "exec sleep 30".into(),
            effects_template: "exec sleep 31 # {effects}".into(),
            stop_grace_ms: 500,
            settle_ms: 30,
            watchdog_ms: 1000,
            ..AudioConfig::default()
        }
    }

    #[tokio::test]
    async fn test_preset_then_field_edit() {
        let (fx, store) = manager_with(sleeping_routes());
        fx.start_current().await.unwrap();

        assert_eq!(fx.apply_preset("sb7_classic").await.unwrap(), "SB7_CLASSIC");
        let classic = fx.preset("SB7_CLASSIC").unwrap().values;
        let status = fx.status();
        assert_eq!(status.params.preset, "SB7_CLASSIC");
        assert_eq!(status.params.values, classic);

        assert_eq!(fx.set_field(FxField::BpLow, 700.0).await.unwrap(), 700);
        let params = store.read(|r| r.fx.clone());
        assert_eq!(params.preset, CUSTOM_PRESET);
        assert_eq!(params.values.bp_low, 700);
        assert_eq!(params.values.bp_high, classic.bp_high);
        fx.supervisor().shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_preset_is_rejected() {
        let (fx, store) = manager_with(sleeping_routes());
        let before = store.read(|r| r.fx.clone());
        assert!(matches!(
            fx.apply_preset("NOPE").await,
            Err(Error::Protocol(ProtocolError::BadValue { .. }))
        ));
        assert_eq!(store.read(|r| r.fx.clone()), before);
    }

    #[tokio::test]
    async fn test_enable_disable_race_ends_in_passthrough() {
        let (fx, store) = manager_with(sleeping_routes());
        fx.start_current().await.unwrap();

        let a = tokio::spawn({
            let fx = fx.clone();
            async move { fx.enable().await }
        });
        // queued behind the enable
        tokio::task::yield_now().await;
        let b = tokio::spawn({
            let fx = fx.clone();
            async move { fx.disable().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert!(!store.read(|r| r.fx.enabled));
        assert_eq!(fx.status().audio.route, Some(RouteKind::Passthrough));
        fx.supervisor().shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_enable_does_not_commit() {
        let config = AudioConfig {
            effects_template: "exit 1 # {effects}".into(),
            ..sleeping_routes()
        };
        let (fx, store) = manager_with(config);
        fx.start_current().await.unwrap();

        assert!(matches!(fx.enable().await, Err(Error::Audio(_))));
        assert!(!store.read(|r| r.fx.enabled));
        assert_eq!(fx.status().audio.route, Some(RouteKind::Passthrough));
        fx.supervisor().shutdown().await;
    }

    #[tokio::test]
    async fn test_save_preset_labels_live_values() {
        let (fx, store) = manager_with(sleeping_routes());
        fx.set_field(FxField::Contrast, 9.0).await.unwrap();
        assert_eq!(fx.save_preset("attic", PresetCategory::Fm).await.unwrap(), "ATTIC");

        let (label, saved) = store.read(|r| (r.fx.preset.clone(), r.catalog.get("ATTIC").cloned()));
        assert_eq!(label, "ATTIC");
        assert_eq!(saved.unwrap().values.contrast_amount, 9);
        assert!(fx.save_preset("SB7_CLASSIC", PresetCategory::Sb7).await.is_err());
    }
}
