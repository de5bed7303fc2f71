//! Daemon assembly
//!
//! Wires the store, engines and listeners together in startup order and
//! tears them down again. The binary and the integration tests both go
//! through [`Daemon::start`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::constants::ACTIVITY_LOG_CAPACITY;
use crate::error::Result;
use crate::fx::{AudioSupervisor, FxManager};
use crate::hardware::{bounded, Hardware};
use crate::hub::Hub;
use crate::ingest::{ActivityLog, SatelliteListener};
use crate::led::LedAnimator;
use crate::network::CommandServer;
use crate::state::StateStore;
use crate::sweep::SweepEngine;
use crate::voice::{Announcer, SoundLibrary};

/// Upper bound on how long any one task gets to finish at shutdown
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// A running hub
pub struct Daemon {
    hub: Arc<Hub>,
    store: StateStore,
    supervisor: AudioSupervisor,
    command_addr: SocketAddr,
    satellite_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Daemon {
    /// Bring every subsystem up. Hardware problems never fail startup;
    /// only an unusable listener address does.
    pub async fn start(config: AppConfig, hardware: Hardware) -> Result<Self> {
        let store = StateStore::open(&config.paths.state_file);
        store.apply_boot_policy(&config.boot);

        if store.read(|r| r.hub.muted) {
            let mixer = hardware.mixer.clone();
            match bounded(hardware.io_timeout, move || mixer.set_mute(true)).await {
                Ok(()) => tracing::info!("Restored speaker mute"),
                Err(e) => tracing::warn!("Could not restore mute: {}", e),
            }
        }

        let mut tasks = Vec::new();

        let (supervisor, supervisor_task) = AudioSupervisor::spawn(config.audio.clone());
        tasks.push(("audio supervisor", supervisor_task));
        let fx = Arc::new(FxManager::new(store.clone(), supervisor.clone()));
        if let Err(e) = fx.start_current().await {
            tracing::error!("No audio route running: {}", e);
        }

        let announcer = Arc::new(Announcer::new(
            SoundLibrary::new(&config.paths.sounds_dir),
            config.voice.clone(),
            supervisor.clone(),
            store.clone(),
        ));
        if config.boot.play_startup_sound && announcer.startup_sound().is_some() {
            if let Err(e) = announcer.spawn_play(None) {
                tracing::warn!("Startup sound skipped: {}", e);
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);

        let (leds, led_task) = LedAnimator::spawn(
            store.clone(),
            hardware.sweep_led.clone(),
            hardware.box_led.clone(),
            Duration::from_millis(config.leds.tick_ms),
            shutdown_rx.clone(),
        );
        tasks.push(("led animator", led_task));

        let (sweep, sweep_task) = SweepEngine::spawn(
            store.clone(),
            hardware.tuner.clone(),
            config.sweep.clone(),
            Some(leds.step_notifier()),
            shutdown_rx.clone(),
        );
        tasks.push(("sweep engine", sweep_task));

        let activity = Arc::new(ActivityLog::new(
            ACTIVITY_LOG_CAPACITY,
            config.paths.activity_log.clone(),
        ));
        let hub = Arc::new(Hub::new(
            store.clone(),
            sweep,
            fx,
            announcer.clone(),
            activity.clone(),
            &hardware,
        ));

        let commands = CommandServer::bind(&config.network, hub.clone())?;
        let satellites = SatelliteListener::bind(&config.network, activity, Some(announcer))?;
        let command_addr = commands.local_addr()?;
        let satellite_addr = satellites.local_addr()?;
        tasks.push(("command server", tokio::spawn(commands.run(shutdown_rx.clone()))));
        tasks.push(("satellite ingest", tokio::spawn(satellites.run(shutdown_rx))));

        tracing::info!(
            "Hub up: commands on {}, satellites on {}, hardware {:?}",
            command_addr,
            satellite_addr,
            hardware.presence
        );

        Ok(Self {
            hub,
            store,
            supervisor,
            command_addr,
            satellite_addr,
            shutdown,
            tasks,
        })
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    pub fn satellite_addr(&self) -> SocketAddr {
        self.satellite_addr
    }

    /// Stop the listeners and engines, kill the route and write the final
    /// snapshot.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        let _ = self.shutdown.send(true);
        self.supervisor.shutdown().await;

        for (name, task) in self.tasks {
            match tokio::time::timeout(TASK_STOP_TIMEOUT, task).await {
                Ok(Ok(())) => tracing::debug!("{} stopped", name),
                Ok(Err(e)) => tracing::warn!("{} ended abnormally: {}", name, e),
                Err(_) => tracing::warn!("{} did not stop in time", name),
            }
        }

        self.store.flush();
        tracing::info!("Shutdown complete");
    }
}
