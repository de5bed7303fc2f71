//! Routing pipelines
//!
//! A route is a shell pipeline (`arecord | sox | aplay`) that owns the sound
//! card while it runs. Exactly one route is alive at a time.

use serde::Serialize;

use super::params::FxValues;
use crate::config::AudioConfig;

/// Which pipeline to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Fixed clean-up chain, no user parameters
    Passthrough,
    /// Full effects chain built from the live parameters
    Effects(FxValues),
}

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Passthrough => RouteKind::Passthrough,
            Route::Effects(_) => RouteKind::Effects,
        }
    }

    /// Expand the configured template into a `sh -c` command line
    pub fn command_line(&self, audio: &AudioConfig) -> String {
        let template = match self {
            Route::Passthrough => audio.passthrough_template.clone(),
            Route::Effects(values) => audio
                .effects_template
                .replace("{effects}", &effects_chain(values)),
        };
        template
            .replace("{capture}", &audio.capture_device)
            .replace("{output}", &audio.output_device)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Passthrough,
    Effects,
}

/// sox effect list for the given parameters
///
/// A contrast of 0 drops the `contrast` stage entirely.
pub fn effects_chain(v: &FxValues) -> String {
    let mut chain = format!(
        "highpass 250 lowpass 4800 compand 0.08,0.2 -28,-18 6 gain {} sinc {}-{}",
        v.pre_gain_db, v.bp_low, v.bp_high
    );
    if v.contrast_amount > 0 {
        chain.push_str(&format!(" contrast {}", v.contrast_amount));
    }
    chain.push_str(&format!(
        " reverb {} {} {} {} gain {} remix 1,2 1,2",
        v.reverb_room, v.reverb_damping, v.reverb_wet, v.reverb_dry, v.post_gain_db
    ));
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::presets::PresetCatalog;

    #[test]
    fn test_effects_chain_for_classic() {
        let catalog = PresetCatalog::default();
        let v = catalog.get("SB7_CLASSIC").unwrap().values;
        assert_eq!(
            effects_chain(&v),
            "highpass 250 lowpass 4800 compand 0.08,0.2 -28,-18 6 gain -6 sinc 500-2600 \
             contrast 20 reverb 35 40 100 55 gain 8 remix 1,2 1,2"
        );
    }

    #[test]
    fn test_zero_contrast_is_omitted() {
        let mut v = PresetCatalog::default().get("FM_RAW_PORTAL").unwrap().values;
        v.contrast_amount = 0;
        assert!(!effects_chain(&v).contains("contrast"));
    }

    #[test]
    fn test_command_line_substitutes_devices() {
        let mut audio = AudioConfig::default();
        audio.capture_device = "hw:1,0".into();
        audio.output_device = "hw:2,0".into();

        let line = Route::Passthrough.command_line(&audio);
        assert!(line.starts_with("arecord -D hw:1,0 "));
        assert!(line.ends_with("aplay -D hw:2,0"));
        assert!(!line.contains('{'));

        let v = PresetCatalog::default().get("FM_DEEP_VOICE").unwrap().values;
        let line = Route::Effects(v).command_line(&audio);
        assert!(line.contains("sinc 400-2200"));
        assert!(!line.contains('{'));
    }
}
