//! LED animator
//!
//! A single task renders both channels every tick (20 ms by default) and
//! whenever the sweep engine reports a step. Levels are computed under the
//! state lock and written to the drivers after it is released.

pub mod pattern;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::constants::DEGRADED_AFTER_FAILURES;
use crate::hardware::LedOutput;
use crate::state::{LedChannel, StateStore};

pub use pattern::render;

/// Handle to the animation task
#[derive(Clone)]
pub struct LedAnimator {
    step: Arc<Notify>,
}

impl LedAnimator {
    pub fn spawn(
        store: StateStore,
        sweep_led: Arc<dyn LedOutput>,
        box_led: Arc<dyn LedOutput>,
        tick: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let step = Arc::new(Notify::new());
        let task = Animation {
            store,
            outputs: [sweep_led, box_led],
            last: [None; 2],
            failures: [0; 2],
        };
        let handle = tokio::spawn(task.run(tick, step.clone(), shutdown));
        (Self { step }, handle)
    }

    /// Notifier the sweep engine pokes after each step
    pub fn step_notifier(&self) -> Arc<Notify> {
        self.step.clone()
    }
}

struct Animation {
    store: StateStore,
    outputs: [Arc<dyn LedOutput>; 2],
    /// Last level successfully written per channel
    last: [Option<f32>; 2],
    failures: [u32; 2],
}

impl Animation {
    async fn run(mut self, tick: Duration, step: Arc<Notify>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = step.notified() => {}
                _ = shutdown.changed() => break,
            }
            self.frame(Instant::now());
        }

        for output in &self.outputs {
            if let Err(e) = output.set_intensity(0.0) {
                tracing::warn!("Could not switch off LED {}: {}", output.name(), e);
            }
        }
        tracing::debug!("LED animator stopped");
    }

    fn frame(&mut self, now: Instant) {
        let levels = self.store.read(|r| {
            let since_step = r.runtime.last_sweep_step.map(|at| now.saturating_duration_since(at));
            LedChannel::ALL.map(|channel| {
                let runtime = &r.runtime.leds[channel.index()];
                render(
                    r.hub.led_mode(channel),
                    now.saturating_duration_since(runtime.mode_since),
                    r.leds.channel(channel),
                    since_step,
                )
            })
        });

        for channel in LedChannel::ALL {
            self.write(channel, levels[channel.index()]);
        }
    }

    fn write(&mut self, channel: LedChannel, level: f32) {
        let i = channel.index();
        if self.last[i] == Some(level) {
            return;
        }

        match self.outputs[i].set_intensity(level) {
            Ok(()) => {
                self.last[i] = Some(level);
                if self.failures[i] >= DEGRADED_AFTER_FAILURES {
                    tracing::info!("LED {} recovered", channel.as_str());
                    self.store.update_runtime(|rt| rt.leds[i].degraded = false);
                }
                self.failures[i] = 0;
            }
            Err(e) => {
                self.last[i] = None;
                self.failures[i] += 1;
                if self.failures[i] == DEGRADED_AFTER_FAILURES {
                    tracing::error!("LED {} degraded: {}", channel.as_str(), e);
                    self.store.update_runtime(|rt| rt.leds[i].degraded = true);
                } else if self.failures[i] < DEGRADED_AFTER_FAILURES {
                    tracing::warn!("LED {} write failed: {}", channel.as_str(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::testing::RecordingLed;
    use crate::state::LedMode;
    use std::sync::atomic::Ordering;

    fn animation(store: &StateStore) -> (Animation, Arc<RecordingLed>, Arc<RecordingLed>) {
        let sweep = Arc::new(RecordingLed::default());
        let boxed = Arc::new(RecordingLed::default());
        let anim = Animation {
            store: store.clone(),
            outputs: [sweep.clone(), boxed.clone()],
            last: [None; 2],
            failures: [0; 2],
        };
        (anim, sweep, boxed)
    }

    #[test]
    fn test_channels_render_independently() {
        let store = StateStore::in_memory();
        store.commit(|r| {
            r.set_led_mode(LedChannel::Sweep, LedMode::On);
            r.set_led_mode(LedChannel::Box, LedMode::Off);
            r.leds.sweep.max_brightness = 51;
        });
        let (mut anim, sweep, boxed) = animation(&store);
        anim.frame(Instant::now());

        assert!((sweep.levels.lock()[0] - 0.2).abs() < 1e-6);
        assert_eq!(boxed.levels.lock()[0], 0.0);
    }

    #[test]
    fn test_unchanged_level_not_rewritten() {
        let store = StateStore::in_memory();
        store.commit(|r| r.set_led_mode(LedChannel::Box, LedMode::On));
        let (mut anim, _, boxed) = animation(&store);
        anim.frame(Instant::now());
        anim.frame(Instant::now());
        assert_eq!(boxed.levels.lock().len(), 1);
    }

    #[test]
    fn test_failures_set_degraded_flag() {
        let store = StateStore::in_memory();
        store.commit(|r| r.set_led_mode(LedChannel::Sweep, LedMode::On));
        let (mut anim, sweep, _) = animation(&store);
        sweep.failing.store(true, Ordering::SeqCst);

        for _ in 0..2 {
            anim.frame(Instant::now());
        }
        assert!(!store.read(|r| r.runtime.leds[0].degraded));
        anim.frame(Instant::now());
        assert!(store.read(|r| r.runtime.leds[0].degraded));
        assert!(!store.read(|r| r.runtime.leds[1].degraded));

        sweep.failing.store(false, Ordering::SeqCst);
        anim.frame(Instant::now());
        assert!(!store.read(|r| r.runtime.leds[0].degraded));
    }

    #[tokio::test]
    async fn test_sweep_step_pulses_led() {
        let store = StateStore::in_memory();
        store.commit(|r| {
            r.set_led_mode(LedChannel::Sweep, LedMode::Sweep);
            r.leds.sweep.speed = 1; // 40 ms pulse
        });
        let sweep = Arc::new(RecordingLed::default());
        let (tx, rx) = watch::channel(false);
        let (animator, handle) = LedAnimator::spawn(
            store.clone(),
            sweep.clone(),
            Arc::new(RecordingLed::default()),
            Duration::from_millis(10),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.update_runtime(|rt| rt.last_sweep_step = Some(Instant::now()));
        animator.step_notifier().notify_one();
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send(true).unwrap();
        handle.await.unwrap();

        let levels = sweep.levels.lock().clone();
        assert!(levels.contains(&1.0), "levels: {:?}", levels);
        // pulse ended, then switched off at shutdown
        assert_eq!(levels.last(), Some(&0.0));
    }
}
