//! Named effects presets
//!
//! The built-in table is compiled in and immutable. User presets saved over
//! the protocol are appended after it and travel with the snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::params::FxValues;
use crate::constants::CUSTOM_PRESET;
use crate::error::ProtocolError;

/// Audio source a preset is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresetCategory {
    /// External spirit-box radio fed into the capture input
    #[serde(rename = "SB7")]
    Sb7,
    /// The hub's own TEA5767 sweep
    #[serde(rename = "FM")]
    Fm,
}

impl PresetCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SB7" => Some(Self::Sb7),
            "FM" => Some(Self::Fm),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sb7 => "SB7",
            Self::Fm => "FM",
        }
    }
}

impl fmt::Display for PresetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxPreset {
    pub name: String,
    pub category: PresetCategory,
    pub description: String,
    #[serde(flatten)]
    pub values: FxValues,
    #[serde(default)]
    pub builtin: bool,
}

/// `LIST` row
#[derive(Debug, Clone, Serialize)]
pub struct PresetSummary<'a> {
    pub name: &'a str,
    pub category: PresetCategory,
    pub description: &'a str,
}

#[allow(clippy::too_many_arguments)]
const fn values(
    bp_low: i32,
    bp_high: i32,
    reverb_room: i32,
    reverb_damping: i32,
    reverb_wet: i32,
    reverb_dry: i32,
    contrast_amount: i32,
    pre_gain_db: i32,
    post_gain_db: i32,
) -> FxValues {
    FxValues {
        bp_low,
        bp_high,
        reverb_room,
        reverb_damping,
        reverb_wet,
        reverb_dry,
        contrast_amount,
        pre_gain_db,
        post_gain_db,
    }
}

const BUILTIN: [(&str, PresetCategory, &str, FxValues); 15] = [
    (
        "SB7_CLASSIC",
        PresetCategory::Sb7,
        "Balanced portal mode - the baseline that works great",
        values(500, 2600, 35, 40, 100, 55, 20, -6, 8),
    ),
    (
        "SB7_CRYSTAL_CLEAR",
        PresetCategory::Sb7,
        "Maximum voice clarity - tight vocal range, minimal noise",
        values(550, 2400, 32, 42, 95, 60, 17, -7, 7),
    ),
    (
        "SB7_DEEP_VOICE",
        PresetCategory::Sb7,
        "Enhanced low frequencies for deeper male voices",
        values(400, 2200, 33, 38, 98, 57, 19, -6, 9),
    ),
    (
        "SB7_HIGH_VOICE",
        PresetCategory::Sb7,
        "Enhanced high frequencies for lighter female/child voices",
        values(600, 2800, 34, 41, 97, 58, 18, -6, 8),
    ),
    (
        "SB7_DYNAMIC_GATE",
        PresetCategory::Sb7,
        "Advanced multi-stage processing with dynamic compression gate",
        values(450, 2400, 20, 35, 45, 40, 12, -6, 8),
    ),
    (
        "SB7_CLARITY_MAX",
        PresetCategory::Sb7,
        "Minimal static, maximal intelligibility - EVP-safe sweet spot",
        values(420, 2850, 22, 38, 65, 55, 17, -5, 10),
    ),
    (
        "SB7_STATIC_KILLER",
        PresetCategory::Sb7,
        "Aggressive static reduction with enhanced voice punch",
        values(480, 2700, 22, 38, 70, 50, 19, -5, 10),
    ),
    (
        "FM_RAW_PORTAL",
        PresetCategory::Fm,
        "Clean voice isolation - default Ghost Portal style preset",
        values(500, 2600, 30, 45, 85, 65, 18, -6, 8),
    ),
    (
        "FM_CRYSTAL_CLEAR",
        PresetCategory::Fm,
        "Maximum voice clarity - tight vocal range, minimal noise",
        values(550, 2400, 28, 48, 80, 70, 15, -7, 7),
    ),
    (
        "FM_DEEP_VOICE",
        PresetCategory::Fm,
        "Enhanced low frequencies for deeper male voices",
        values(400, 2200, 32, 42, 90, 60, 16, -6, 9),
    ),
    (
        "FM_HIGH_VOICE",
        PresetCategory::Fm,
        "Enhanced high frequencies for lighter female/child voices",
        values(600, 2800, 30, 46, 85, 65, 17, -6, 8),
    ),
    (
        "FM_DYNAMIC_GATE",
        PresetCategory::Fm,
        "Advanced multi-stage processing with dynamic compression gate",
        values(450, 2400, 20, 35, 45, 40, 12, -6, 8),
    ),
    (
        "FM_CLARITY_MAX",
        PresetCategory::Fm,
        "Definitive high-clarity FM filter - balanced intelligibility",
        values(460, 2750, 26, 40, 58, 52, 15, -6, 11),
    ),
    (
        "FM_CLARITY_VOICE_ONLY",
        PresetCategory::Fm,
        "Super clean, maximum noise reduction - loud voices, minimal static",
        values(520, 2550, 18, 40, 48, 55, 14, -7, 12),
    ),
    (
        "FM_EXTREME_VOICE_ONLY",
        PresetCategory::Fm,
        "Nuclear static removal - 80-85% noise cut, maximum voice boost",
        values(600, 2400, 10, 45, 35, 65, 20, -9, 12),
    ),
];

/// Name of the preset loaded on a fresh install
pub const DEFAULT_PRESET: &str = "FM_RAW_PORTAL";

/// All compiled-in presets, in catalog order
pub fn builtin_presets() -> Vec<FxPreset> {
    BUILTIN
        .iter()
        .map(|(name, category, description, values)| FxPreset {
            name: name.to_string(),
            category: *category,
            description: description.to_string(),
            values: *values,
            builtin: true,
        })
        .collect()
}

pub(crate) fn default_preset() -> FxPreset {
    builtin_presets()
        .into_iter()
        .find(|p| p.name == DEFAULT_PRESET)
        .unwrap_or_else(|| FxPreset {
            name: DEFAULT_PRESET.to_string(),
            category: PresetCategory::Fm,
            description: String::new(),
            values: BUILTIN[7].3,
            builtin: true,
        })
}

/// Ordered preset catalog: built-ins first, then user entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    entries: Vec<FxPreset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self {
            entries: builtin_presets(),
        }
    }
}

impl PresetCatalog {
    /// Rebuild a catalog from persisted entries.
    ///
    /// Built-ins always come from the compiled table; persisted entries that
    /// claim a built-in name are ignored, as are invalid ones.
    pub fn with_user_presets(saved: impl IntoIterator<Item = FxPreset>) -> Self {
        let mut catalog = Self::default();
        for mut preset in saved {
            if preset.builtin || catalog.is_builtin(&preset.name) {
                continue;
            }
            if let Err(e) = validate_name(&preset.name).and_then(|_| preset.values.validate()) {
                tracing::warn!("Dropping saved preset {}: {}", preset.name, e);
                continue;
            }
            preset.builtin = false;
            catalog.upsert(preset);
        }
        catalog
    }

    pub fn entries(&self) -> &[FxPreset] {
        &self.entries
    }

    pub fn summaries(&self) -> Vec<PresetSummary<'_>> {
        self.entries
            .iter()
            .map(|p| PresetSummary {
                name: &p.name,
                category: p.category,
                description: &p.description,
            })
            .collect()
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&FxPreset> {
        self.entries
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.get(name).map(|p| p.builtin).unwrap_or(false)
    }

    /// Save `values` as a user preset, overwriting an earlier user entry of
    /// the same name. Built-in names and `CUSTOM` are refused.
    pub fn save(
        &mut self,
        name: &str,
        category: PresetCategory,
        values: FxValues,
    ) -> Result<&FxPreset, ProtocolError> {
        let name = name.to_ascii_uppercase();
        validate_name(&name)?;
        if self.is_builtin(&name) {
            return Err(ProtocolError::Usage(format!(
                "FX PRESET {} is built-in",
                name
            )));
        }
        values.validate()?;

        let preset = FxPreset {
            description: format!("Custom {} preset", category),
            name,
            category,
            values,
            builtin: false,
        };
        Ok(self.upsert(preset))
    }

    fn upsert(&mut self, preset: FxPreset) -> &FxPreset {
        let index = match self
            .entries
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(&preset.name))
        {
            Some(i) => {
                self.entries[i] = preset;
                i
            }
            None => {
                self.entries.push(preset);
                self.entries.len() - 1
            }
        };
        &self.entries[index]
    }
}

fn validate_name(name: &str) -> Result<(), ProtocolError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if name.is_empty() || name.len() > 48 || !valid_chars {
        return Err(ProtocolError::BadValue {
            field: "FX PRESET".into(),
            value: name.to_string(),
        });
    }
    if name.eq_ignore_ascii_case(CUSTOM_PRESET) {
        return Err(ProtocolError::Usage(format!(
            "FX PRESET {} is reserved",
            CUSTOM_PRESET
        )));
    }
    Ok(())
}
