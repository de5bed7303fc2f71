//! Sweep engine
//!
//! One long-lived task steps the tuner through the band while the hub is
//! running. START/STOP/SPEED never spawn or cancel anything; they change the
//! shared record and [`SweepEngine::wake`] the task so it re-reads it and
//! reschedules. Exactly one tick loop therefore exists for the engine's
//! lifetime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::config::SweepConfig;
use crate::constants::DEGRADED_AFTER_FAILURES;
use crate::error::{Error, ProtocolError};
use crate::hardware::{self, Tuner};
use crate::state::{Direction, StateStore};

/// Next register value and direction after one step from `current`.
///
/// The result is always inside `[min_khz, max_khz]`. At a bound the sweep
/// parks there, or turns around if `bounce` is set.
pub fn next_step(current: u32, direction: Direction, config: &SweepConfig) -> (u32, Direction) {
    let (min, max, step) = (config.min_khz, config.max_khz, config.step_khz);
    let current = current.clamp(min, max);
    match direction {
        Direction::Up if current >= max => {
            if config.bounce {
                (current.saturating_sub(step).max(min), Direction::Down)
            } else {
                (max, Direction::Up)
            }
        }
        Direction::Up => (current.saturating_add(step).min(max), Direction::Up),
        Direction::Down if current <= min => {
            if config.bounce {
                (current.saturating_add(step).min(max), Direction::Up)
            } else {
                (min, Direction::Down)
            }
        }
        Direction::Down => (current.saturating_sub(step).max(min), Direction::Down),
    }
}

/// Where a sweep starts for a given direction
pub fn start_frequency(direction: Direction, config: &SweepConfig) -> u32 {
    match direction {
        Direction::Up => config.min_khz,
        Direction::Down => config.max_khz,
    }
}

struct Inner {
    store: StateStore,
    tuner: Arc<dyn Tuner>,
    config: SweepConfig,
    wake: Notify,
    step_hook: Option<Arc<Notify>>,
    loops: AtomicUsize,
}

/// Handle to the sweep task
#[derive(Clone)]
pub struct SweepEngine {
    inner: Arc<Inner>,
}

impl SweepEngine {
    /// Start the tick task. `step_hook` is notified after every step so the
    /// LED animator can pulse sweep-linked channels.
    pub fn spawn(
        store: StateStore,
        tuner: Arc<dyn Tuner>,
        config: SweepConfig,
        step_hook: Option<Arc<Notify>>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        store.update(|r| {
            r.runtime.frequency_khz = start_frequency(r.hub.direction, &config);
        });

        let inner = Arc::new(Inner {
            store,
            tuner,
            config,
            wake: Notify::new(),
            step_hook,
            loops: AtomicUsize::new(0),
        });
        let handle = tokio::spawn(run(inner.clone(), shutdown));
        (Self { inner }, handle)
    }

    /// Make the task re-read running state and speed now
    pub fn wake(&self) {
        self.inner.wake.notify_one();
    }

    /// Number of tick loops currently alive (0 or 1)
    pub fn active_loops(&self) -> usize {
        self.inner.loops.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SweepConfig {
        &self.inner.config
    }

    /// Tune to `khz` once. Refused while the sweep is running, since the
    /// next tick would overwrite it.
    pub async fn tune(&self, khz: u32, limit: Duration) -> Result<(), Error> {
        if self.inner.store.read(|r| r.hub.running) {
            return Err(ProtocolError::Usage("FM TUNE not allowed while sweeping".into()).into());
        }
        let tuner = self.inner.tuner.clone();
        hardware::bounded(limit, move || tuner.set_frequency(khz)).await?;
        self.inner.store.update_runtime(|rt| {
            rt.frequency_khz = khz;
            rt.tuner_failures = 0;
            rt.tuner_degraded = false;
        });
        tracing::info!("Tuned to {} kHz", khz);
        Ok(())
    }
}

struct LoopGuard<'a>(&'a AtomicUsize);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    inner.loops.fetch_add(1, Ordering::SeqCst);
    let _guard = LoopGuard(&inner.loops);
    tracing::debug!("Sweep loop started");

    loop {
        let (running, interval) = inner
            .store
            .read(|r| (r.hub.running, r.hub.speed.interval()));

        if running {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    // I2C write and the snapshot flush block
                    let stepper = inner.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || tick(&stepper)).await {
                        tracing::error!("Sweep step failed: {}", e);
                    }
                }
                _ = inner.wake.notified() => {}
                _ = shutdown.changed() => break,
            }
        } else {
            tokio::select! {
                _ = inner.wake.notified() => {}
                _ = shutdown.changed() => break,
            }
        }
    }

    tracing::debug!("Sweep loop stopped");
}

fn tick(inner: &Inner) {
    let config = &inner.config;
    let step = inner.store.update(|r| {
        if !r.hub.running {
            return None;
        }
        let (khz, direction) = next_step(r.runtime.frequency_khz, r.hub.direction, config);
        let bounced = direction != r.hub.direction;
        r.hub.direction = direction;
        r.runtime.frequency_khz = khz;
        r.runtime.last_sweep_step = Some(Instant::now());
        Some((khz, bounced))
    });
    let Some((khz, bounced)) = step else {
        return;
    };
    if bounced {
        inner.store.flush();
    }

    let result = inner.tuner.set_frequency(khz);
    inner.store.update_runtime(|rt| match result {
        Ok(()) => {
            if rt.tuner_degraded {
                tracing::info!("Tuner recovered at {} kHz", khz);
            }
            rt.tuner_failures = 0;
            rt.tuner_degraded = false;
        }
        Err(e) => {
            rt.tuner_failures += 1;
            if rt.tuner_failures >= DEGRADED_AFTER_FAILURES && !rt.tuner_degraded {
                rt.tuner_degraded = true;
                tracing::error!("Tuner degraded after {} failed writes: {}", rt.tuner_failures, e);
            } else if !rt.tuner_degraded {
                tracing::warn!("Tuner write failed at {} kHz: {}", khz, e);
            }
        }
    });

    if let Some(hook) = &inner.step_hook {
        hook.notify_one();
    }
}
