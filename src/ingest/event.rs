//! Satellite event schema
//!
//! Satellites send one JSON object per connection:
//!
//! ```text
//! {"device":"rempod","id":"rempod_01","location":"Hallway","event":"em_trigger",
//!  "strength":7,"temperature":19.5,"pressure":1012.3,"battery":88,"timestamp":5123}
//! {"device":"musicbox","id":"musicbox_01","location":"Nursery","event":"motion_detected",
//!  "melody":"lullaby","duration":4200,"battery":61,"timestamp":902}
//! ```
//!
//! Parsing is strict: unknown keys, missing required keys or out-of-range
//! values reject the whole message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IngestError;

/// Longest accepted `id` / `location`
const MAX_LABEL_LEN: usize = 64;

/// Highest field-trigger strength a REM Pod reports
pub const MAX_STRENGTH: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// EM field / temperature sensor
    Rempod,
    /// Motion-triggered music box
    Musicbox,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Rempod, DeviceClass::Musicbox];

    /// Controller verb for this device's settings
    pub fn verb(self) -> &'static str {
        match self {
            Self::Rempod => "REMPOD",
            Self::Musicbox => "MUSICBOX",
        }
    }

    /// Sound library folder holding this device's alerts
    pub fn sound_folder(self) -> &'static str {
        match self {
            Self::Rempod => "RemPod",
            Self::Musicbox => "MusicBox",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FieldTrigger,
    TempDeviation,
    Motion,
    LowBattery,
}

impl EventKind {
    /// Wire names, including the firmware's own spellings
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "em_trigger" | "field_trigger" => Some(Self::FieldTrigger),
            "temp_deviation" => Some(Self::TempDeviation),
            "motion_detected" | "motion" => Some(Self::Motion),
            "low_battery" => Some(Self::LowBattery),
            _ => None,
        }
    }

    /// Kinds that trigger an announcement
    pub fn is_alerting(self) -> bool {
        !matches!(self, Self::TempDeviation)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvent {
    device: DeviceClass,
    id: String,
    location: String,
    event: String,
    #[serde(default)]
    strength: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    pressure: Option<f64>,
    #[serde(default)]
    melody: Option<String>,
    /// Melody length in milliseconds (music box)
    #[serde(default)]
    duration: Option<u64>,
    battery: f64,
    timestamp: u64,
}

/// A validated event, stamped on receipt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteEvent {
    pub receipt_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub device: DeviceClass,
    pub id: String,
    pub location: String,
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub strength: f64,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melody: Option<String>,
    pub battery: u8,
    /// Seconds since the satellite booted
    pub timestamp: u64,
}

impl SatelliteEvent {
    /// Parse and validate one line
    pub fn parse(line: &str) -> Result<Self, IngestError> {
        let raw: RawEvent =
            serde_json::from_str(line.trim()).map_err(|e| IngestError::Malformed(e.to_string()))?;
        Self::validate(raw, Utc::now())
    }

    fn validate(raw: RawEvent, received_at: DateTime<Utc>) -> Result<Self, IngestError> {
        let id = label("id", raw.id)?;
        let location = label("location", raw.location)?;
        let kind = EventKind::parse(&raw.event).ok_or_else(|| IngestError::InvalidField {
            field: "event",
            reason: format!("unknown event {:?}", raw.event),
        })?;

        let strength = match (raw.device, raw.strength, raw.duration) {
            (_, Some(s), _) => s,
            (DeviceClass::Musicbox, None, Some(ms)) => (ms as f64 / 1000.0).min(MAX_STRENGTH),
            (DeviceClass::Rempod, None, _) => {
                return Err(IngestError::InvalidField {
                    field: "strength",
                    reason: "required for rempod".into(),
                })
            }
            (DeviceClass::Musicbox, None, None) => {
                return Err(IngestError::InvalidField {
                    field: "duration",
                    reason: "required for musicbox".into(),
                })
            }
        };
        if !strength.is_finite() || !(0.0..=MAX_STRENGTH).contains(&strength) {
            return Err(IngestError::InvalidField {
                field: "strength",
                reason: format!("{} outside 0 to {}", strength, MAX_STRENGTH),
            });
        }

        if !raw.battery.is_finite() || !(0.0..=100.0).contains(&raw.battery) {
            return Err(IngestError::InvalidField {
                field: "battery",
                reason: format!("{} outside 0 to 100", raw.battery),
            });
        }
        for (field, value) in [("temperature", raw.temperature), ("pressure", raw.pressure)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(IngestError::InvalidField {
                    field,
                    reason: "not a finite number".into(),
                });
            }
        }

        Ok(Self {
            receipt_id: Uuid::new_v4(),
            received_at,
            device: raw.device,
            id,
            location,
            kind,
            strength,
            temperature: raw.temperature,
            pressure: raw.pressure,
            melody: raw.melody,
            battery: raw.battery.round() as u8,
            timestamp: raw.timestamp,
        })
    }
}

fn label(field: &'static str, value: String) -> Result<String, IngestError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_LABEL_LEN || trimmed.chars().any(char::is_control) {
        return Err(IngestError::InvalidField {
            field,
            reason: format!("invalid label {:?}", value),
        });
    }
    Ok(trimmed.to_string())
}
