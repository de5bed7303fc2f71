//! LED pattern renderer
//!
//! `render` is a pure function: the same mode, phase, settings and sweep
//! timing always produce the same level. Randomized modes seed their RNG
//! from the frame index instead of keeping generator state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::time::Duration;

use crate::state::{ChannelSettings, LedMode};

/// On/off frames of one heartbeat cycle (double thump, then rest)
const HEARTBEAT: [bool; 9] = [true, true, false, true, true, false, false, false, false];

/// Breath period at speed factor 1.0, in seconds
const BREATH_PERIOD_S: f32 = 3.0;

const HEARTBEAT_FRAME_S: f32 = 0.08;
const STROBE_FRAME_S: f32 = 0.05;
const FLICKER_FRAME_S: f32 = 0.08;
const BURST_FRAME_S: f32 = 0.15;

/// Chance a random-burst frame flashes at full brightness
const BURST_PROBABILITY: f32 = 0.1;

/// Length of the pulse shown after a sweep step
pub fn sweep_pulse(settings: &ChannelSettings) -> Duration {
    let speed = settings
        .speed
        .clamp(ChannelSettings::MIN_SPEED, ChannelSettings::MAX_SPEED) as u64;
    Duration::from_millis(10 + (11 - speed) * 3)
}

/// Output level (0..1, already mapped into the channel's brightness window)
///
/// * `elapsed` - time since the mode was selected
/// * `since_step` - time since the last sweep step, if there was one
pub fn render(
    mode: LedMode,
    elapsed: Duration,
    settings: &ChannelSettings,
    since_step: Option<Duration>,
) -> f32 {
    let factor = settings.speed_factor();
    let t = elapsed.as_secs_f32();

    let level = match mode {
        LedMode::Off => return 0.0,
        LedMode::On => 1.0,
        LedMode::Breath => breath(t, BREATH_PERIOD_S * factor),
        LedMode::BreathFast => breath(t, BREATH_PERIOD_S * factor / 3.0),
        LedMode::Heartbeat => {
            let frame = frame_index(t, HEARTBEAT_FRAME_S * factor);
            on_off(HEARTBEAT[(frame % HEARTBEAT.len() as u64) as usize])
        }
        LedMode::Strobe => on_off(frame_index(t, STROBE_FRAME_S * factor) % 2 == 0),
        LedMode::Flicker => {
            let mut rng = frame_rng(mode, frame_index(t, FLICKER_FRAME_S * factor));
            rng.random_range(0.2..1.0)
        }
        LedMode::RandomBurst => {
            let mut rng = frame_rng(mode, frame_index(t, BURST_FRAME_S * factor));
            if rng.random::<f32>() < BURST_PROBABILITY {
                1.0
            } else {
                rng.random_range(0.0..0.3)
            }
        }
        LedMode::Sweep => match since_step {
            Some(since) if since < sweep_pulse(settings) => 1.0,
            _ => 0.0,
        },
    };

    settings.scale(level)
}

/// Sine breath starting dark at t = 0
fn breath(t: f32, period: f32) -> f32 {
    ((2.0 * PI * t / period - PI / 2.0).sin() + 1.0) / 2.0
}

fn frame_index(t: f32, frame: f32) -> u64 {
    (t / frame).floor() as u64
}

fn on_off(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

fn frame_rng(mode: LedMode, frame: u64) -> StdRng {
    let salt = (mode as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(frame ^ salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ChannelSettings {
        ChannelSettings::default()
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_on_off_respect_window() {
        let dim = ChannelSettings {
            min_brightness: 0,
            max_brightness: 51,
            speed: 5,
        };
        assert!((render(LedMode::On, ms(0), &dim, None) - 0.2).abs() < 1e-6);
        assert_eq!(render(LedMode::Off, ms(500), &dim, None), 0.0);
    }

    #[test]
    fn test_breath_starts_dark_and_peaks_mid_period() {
        let s = full(); // factor 8/6, period 4 s
        assert!(render(LedMode::Breath, ms(0), &s, None) < 1e-3);
        assert!(render(LedMode::Breath, ms(2000), &s, None) > 0.999);
        // breath_fast peaks three times sooner
        assert!(render(LedMode::BreathFast, Duration::from_secs_f32(4.0 / 6.0), &s, None) > 0.999);
    }

    #[test]
    fn test_heartbeat_sequence() {
        let s = ChannelSettings {
            speed: 5,
            ..full()
        }; // factor 1.0, 80 ms frames
        let levels: Vec<f32> = (0..9)
            .map(|i| render(LedMode::Heartbeat, ms(i * 80 + 40), &s, None))
            .collect();
        assert_eq!(levels, [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_random_modes_are_deterministic() {
        let s = full();
        for mode in [LedMode::Flicker, LedMode::RandomBurst] {
            for t in [0, 37, 480, 9_999] {
                let a = render(mode, ms(t), &s, None);
                let b = render(mode, ms(t), &s, None);
                assert_eq!(a, b);
                assert!((0.0..=1.0).contains(&a));
            }
        }
    }

    #[test]
    fn test_flicker_floor() {
        let s = full();
        for t in (0..5_000).step_by(7) {
            assert!(render(LedMode::Flicker, ms(t), &s, None) >= 0.2);
        }
    }

    #[test]
    fn test_sweep_pulse_follows_step() {
        let s = full(); // speed 3: 34 ms pulse
        assert_eq!(sweep_pulse(&s), ms(34));
        assert_eq!(render(LedMode::Sweep, ms(0), &s, Some(ms(5))), 1.0);
        assert_eq!(render(LedMode::Sweep, ms(0), &s, Some(ms(40))), 0.0);
        assert_eq!(render(LedMode::Sweep, ms(0), &s, None), 0.0);
    }
}
