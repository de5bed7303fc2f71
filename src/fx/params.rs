//! Effects-chain parameters
//!
//! Nine integer fields, each with a declared range. Wire names (`BP_LOW`,
//! `REVERB_WET`, ...) are what the controller sends; JSON keys are what the
//! snapshot and `FX STATUS` carry.

use serde::{Deserialize, Serialize};

use crate::constants::{BANDPASS_MIN_GAP_HZ, CUSTOM_PRESET};
use crate::error::ProtocolError;

/// The nine numeric values of one effects configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxValues {
    pub bp_low: i32,
    pub bp_high: i32,
    pub reverb_room: i32,
    pub reverb_damping: i32,
    pub reverb_wet: i32,
    pub reverb_dry: i32,
    pub contrast_amount: i32,
    pub pre_gain_db: i32,
    pub post_gain_db: i32,
}

impl FxValues {
    /// Check every field against its declared range
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for field in FxField::ALL {
            field.check(field.get(self))?;
        }
        if self.bp_high - self.bp_low < BANDPASS_MIN_GAP_HZ {
            return Err(ProtocolError::Usage(format!(
                "BP_HIGH must be at least {} Hz above BP_LOW",
                BANDPASS_MIN_GAP_HZ
            )));
        }
        Ok(())
    }
}

/// Live effects state: on/off, preset label and values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxParameters {
    pub enabled: bool,

    /// Catalog entry the values came from, or `CUSTOM`
    pub preset: String,

    #[serde(flatten)]
    pub values: FxValues,
}

impl Default for FxParameters {
    fn default() -> Self {
        let default = super::presets::default_preset();
        Self {
            enabled: false,
            preset: default.name.clone(),
            values: default.values,
        }
    }
}

impl FxParameters {
    /// Change one field and mark the configuration as custom.
    ///
    /// Returns the value actually stored (the input rounded to an integer).
    pub fn set_field(&mut self, field: FxField, value: f64) -> Result<i32, ProtocolError> {
        let rounded = field.round(value)?;
        field.set(&mut self.values, rounded);
        self.preset = CUSTOM_PRESET.to_string();
        Ok(rounded)
    }

    /// Replace all values and take the preset's name as label
    pub fn apply_preset(&mut self, name: &str, values: FxValues) {
        self.values = values;
        self.preset = name.to_string();
    }
}

/// One effects parameter, addressed by its wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FxField {
    BpLow,
    BpHigh,
    Reverb,
    ReverbDamp,
    ReverbWet,
    ReverbDry,
    Contrast,
    PreGain,
    PostGain,
}

impl FxField {
    pub const ALL: [FxField; 9] = [
        FxField::BpLow,
        FxField::BpHigh,
        FxField::Reverb,
        FxField::ReverbDamp,
        FxField::ReverbWet,
        FxField::ReverbDry,
        FxField::Contrast,
        FxField::PreGain,
        FxField::PostGain,
    ];

    /// Look up a field by wire name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.wire_name().eq_ignore_ascii_case(name))
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            FxField::BpLow => "BP_LOW",
            FxField::BpHigh => "BP_HIGH",
            FxField::Reverb => "REVERB",
            FxField::ReverbDamp => "REVERB_DAMP",
            FxField::ReverbWet => "REVERB_WET",
            FxField::ReverbDry => "REVERB_DRY",
            FxField::Contrast => "CONTRAST",
            FxField::PreGain => "PRE_GAIN",
            FxField::PostGain => "POST_GAIN",
        }
    }

    /// Inclusive range
    pub fn range(self) -> (i32, i32) {
        match self {
            FxField::BpLow => (100, 2000),
            FxField::BpHigh => (300, 5000),
            FxField::Reverb
            | FxField::ReverbDamp
            | FxField::ReverbWet
            | FxField::ReverbDry => (0, 100),
            FxField::Contrast => (0, 40),
            FxField::PreGain => (-24, 0),
            FxField::PostGain => (0, 18),
        }
    }

    pub fn get(self, values: &FxValues) -> i32 {
        match self {
            FxField::BpLow => values.bp_low,
            FxField::BpHigh => values.bp_high,
            FxField::Reverb => values.reverb_room,
            FxField::ReverbDamp => values.reverb_damping,
            FxField::ReverbWet => values.reverb_wet,
            FxField::ReverbDry => values.reverb_dry,
            FxField::Contrast => values.contrast_amount,
            FxField::PreGain => values.pre_gain_db,
            FxField::PostGain => values.post_gain_db,
        }
    }

    /// Store `value` (already range-checked). Moving one band-pass edge
    /// within 200 Hz of the other pushes the other edge along, clamped into
    /// its own range.
    pub fn set(self, values: &mut FxValues, value: i32) {
        match self {
            FxField::BpLow => {
                values.bp_low = value;
                if values.bp_high - value < BANDPASS_MIN_GAP_HZ {
                    let (_, max) = FxField::BpHigh.range();
                    values.bp_high = (value + BANDPASS_MIN_GAP_HZ).min(max);
                }
            }
            FxField::BpHigh => {
                values.bp_high = value;
                if value - values.bp_low < BANDPASS_MIN_GAP_HZ {
                    let (min, _) = FxField::BpLow.range();
                    values.bp_low = (value - BANDPASS_MIN_GAP_HZ).max(min);
                }
            }
            FxField::Reverb => values.reverb_room = value,
            FxField::ReverbDamp => values.reverb_damping = value,
            FxField::ReverbWet => values.reverb_wet = value,
            FxField::ReverbDry => values.reverb_dry = value,
            FxField::Contrast => values.contrast_amount = value,
            FxField::PreGain => values.pre_gain_db = value,
            FxField::PostGain => values.post_gain_db = value,
        }
    }

    fn check(self, value: i32) -> Result<(), ProtocolError> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(self.out_of_range());
        }
        Ok(())
    }

    /// Round a wire value to an integer and range-check it
    pub fn round(self, value: f64) -> Result<i32, ProtocolError> {
        if !value.is_finite() {
            return Err(ProtocolError::BadValue {
                field: self.wire_name().to_string(),
                value: value.to_string(),
            });
        }
        let (min, max) = self.range();
        let rounded = value.round();
        if rounded < min as f64 || rounded > max as f64 {
            return Err(self.out_of_range());
        }
        Ok(rounded as i32)
    }

    fn out_of_range(self) -> ProtocolError {
        let (min, max) = self.range();
        ProtocolError::OutOfRange {
            field: self.wire_name().to_string(),
            min: min as i64,
            max: max as i64,
        }
    }
}

impl std::fmt::Display for FxField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_field_marks_custom() {
        let mut fx = FxParameters::default();
        let before = fx.values;
        let stored = fx.set_field(FxField::BpLow, 700.0).unwrap();
        assert_eq!(stored, 700);
        assert_eq!(fx.preset, CUSTOM_PRESET);
        assert_eq!(fx.values.bp_low, 700);
        // everything else unchanged
        assert_eq!(fx.values.bp_high, before.bp_high);
        assert_eq!(fx.values.reverb_wet, before.reverb_wet);
    }

    #[test]
    fn test_value_is_rounded() {
        let mut fx = FxParameters::default();
        assert_eq!(fx.set_field(FxField::Contrast, 12.6).unwrap(), 13);
        assert_eq!(fx.set_field(FxField::PreGain, -3.4).unwrap(), -3);
    }

    #[test]
    fn test_out_of_range_rejected_without_mutation() {
        let mut fx = FxParameters::default();
        let before = fx.clone();
        let err = fx.set_field(FxField::PostGain, 19.0).unwrap_err();
        assert_eq!(err.to_string(), "POST_GAIN range 0 to 18");
        assert_eq!(fx, before);
        assert!(fx.set_field(FxField::Reverb, f64::NAN).is_err());
    }

    #[test]
    fn test_bandpass_gap_pushes_high_edge() {
        let mut values = FxParameters::default().values;
        values.bp_high = 1000;
        FxField::BpLow.set(&mut values, 900);
        assert_eq!(values.bp_high, 1100);

        FxField::BpHigh.set(&mut values, 300);
        assert_eq!(values.bp_low, 100);
    }

    #[test]
    fn test_bandpass_push_at_range_edges() {
        let mut values = FxParameters::default().values;
        values.bp_high = 1000;
        FxField::BpLow.set(&mut values, 2000);
        assert_eq!(values.bp_high, 2200);
        FxField::BpHigh.set(&mut values, 5000);
        assert_eq!(values.bp_low, 2000);
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(FxField::parse("reverb_wet"), Some(FxField::ReverbWet));
        assert_eq!(FxField::parse("BP_HIGH"), Some(FxField::BpHigh));
        assert_eq!(FxField::parse("VOLUME"), None);
    }

    #[test]
    fn test_json_keys() {
        let json = serde_json::to_value(FxParameters::default()).unwrap();
        assert_eq!(json["preset"], "FM_RAW_PORTAL");
        assert_eq!(json["bp_low"], 500);
        assert_eq!(json["reverb_damping"], 45);
        assert_eq!(json["enabled"], false);
    }
}
