//! Controller command protocol
//!
//! One command per line, `VERB [ARG...]`, verbs and keywords
//! case-insensitive. Every line gets exactly one reply line: `OK [payload]`
//! or `ERR <reason>`. Lines are parsed into a [`Command`] up front, so a
//! malformed request is rejected before anything is touched.

use std::fmt;

use crate::constants::{
    ACTIVITY_LOG_CAPACITY, FM_TUNE_MAX_KHZ, FM_TUNE_MIN_KHZ, MIC_VOLUME_MAX, SPEAKER_VOLUME_MAX,
};
use crate::error::ProtocolError;
use crate::fx::{FxField, PresetCategory};
use crate::hardware::MixerSetting;
use crate::ingest::DeviceClass;
use crate::state::{LedChannel, LedMode};

/// Longest accepted `SPEED` argument
pub const MAX_SPEED_MS: u32 = 60_000;

/// Default count for `EVENTS`
pub const DEFAULT_EVENT_COUNT: usize = 20;

/// Optional prefix some controllers put in front of every line
const LINE_PREFIX: &str = "CMD:";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Ping,
    Speed(u32),
    Faster,
    Slower,
    Dir(DirChange),
    Start,
    Stop,
    Led(LedChannel, LedMode),
    LedAllOff,
    LedConfig(LedChannel, LedField, u8),
    Mute(bool),
    Sound(SoundCommand),
    Fx(FxCommand),
    Events(usize),
    Mixer(MixerCommand),
    /// `FM TUNE`, in kHz
    FmTune(u32),
    MicStatus,
    Alert(DeviceClass, AlertCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirChange {
    Up,
    Down,
    Toggle,
}

/// `SWEEP_CFG` / `BOX_CFG` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedField {
    Min,
    Max,
    Speed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundCommand {
    List(Option<String>),
    /// `None` plays the startup sound
    Play(Option<String>),
    Set(String),
    Clear,
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FxCommand {
    Enable,
    Disable,
    Status,
    Set(FxField, f64),
    PresetList,
    PresetInfo(String),
    PresetSet(String),
    PresetSave(String, PresetCategory),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerCommand {
    Status,
    Set(MixerSetting),
}

/// `REMPOD` / `MUSICBOX` alert sound selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertCommand {
    Sound(String),
    Sounds,
}

/// One reply line (without the trailing newline)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Err(String),
}

impl Reply {
    pub fn ok(payload: impl Into<String>) -> Self {
        Reply::Ok(payload.into())
    }

    pub fn err(reason: impl fmt::Display) -> Self {
        Reply::Err(reason.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok(payload) if payload.is_empty() => f.write_str("OK"),
            Reply::Ok(payload) => write!(f, "OK {}", payload),
            Reply::Err(reason) => write!(f, "ERR {}", reason),
        }
    }
}

impl From<ProtocolError> for Reply {
    fn from(e: ProtocolError) -> Self {
        Reply::err(e)
    }
}

/// Parse one line into a command
pub fn parse(line: &str) -> Result<Command, ProtocolError> {
    let mut line = line.trim();
    if line
        .get(..LINE_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(LINE_PREFIX))
    {
        line = line[LINE_PREFIX.len()..].trim_start();
    }

    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(ProtocolError::Empty)?.to_ascii_uppercase();
    let args: Vec<&str> = words.collect();

    match verb.as_str() {
        "STATUS" => no_args("STATUS", &args, Command::Status),
        "PING" => no_args("PING", &args, Command::Ping),
        "FASTER" => no_args("FASTER", &args, Command::Faster),
        "SLOWER" => no_args("SLOWER", &args, Command::Slower),
        "START" => no_args("START", &args, Command::Start),
        "STOP" => no_args("STOP", &args, Command::Stop),
        "SPEED" => parse_speed(&args),
        "DIR" => parse_dir(&args),
        "LED" => parse_led(&args),
        "SWEEP_CFG" => parse_led_config(LedChannel::Sweep, "SWEEP_CFG", &args),
        "BOX_CFG" => parse_led_config(LedChannel::Box, "BOX_CFG", &args),
        "MUTE" => parse_mute(&args),
        "SOUND" => parse_sound(&args).map(Command::Sound),
        "FX" => parse_fx(&args).map(Command::Fx),
        "EVENTS" => parse_events(&args),
        "MIXER" => parse_mixer(&args).map(Command::Mixer),
        "FM" => parse_fm(&args),
        "MIC" => match args.as_slice() {
            [sub] if sub.eq_ignore_ascii_case("STATUS") => Ok(Command::MicStatus),
            [] => Err(ProtocolError::Usage("MIC needs subcommand".into())),
            _ => Err(ProtocolError::UnknownSubcommand("MIC".into())),
        },
        "REMPOD" => parse_alert(DeviceClass::Rempod, &args),
        "MUSICBOX" => parse_alert(DeviceClass::Musicbox, &args),
        _ => Err(ProtocolError::UnknownVerb(verb)),
    }
}

fn no_args(verb: &str, args: &[&str], command: Command) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ProtocolError::Usage(format!("{} takes no arguments", verb)))
    }
}

fn parse_speed(args: &[&str]) -> Result<Command, ProtocolError> {
    let [value] = args else {
        return Err(ProtocolError::Usage("SPEED needs ms".into()));
    };
    let ms: u32 = value.parse().map_err(|_| bad_value("SPEED", value))?;
    if ms == 0 || ms > MAX_SPEED_MS {
        return Err(ProtocolError::OutOfRange {
            field: "SPEED".into(),
            min: 1,
            max: MAX_SPEED_MS as i64,
        });
    }
    Ok(Command::Speed(ms))
}

fn parse_dir(args: &[&str]) -> Result<Command, ProtocolError> {
    let [value] = args else {
        return Err(ProtocolError::Usage("DIR needs UP/DOWN/TOGGLE".into()));
    };
    let change = match value.to_ascii_uppercase().as_str() {
        "UP" => DirChange::Up,
        "DOWN" => DirChange::Down,
        "TOGGLE" => DirChange::Toggle,
        _ => return Err(bad_value("DIR", value)),
    };
    Ok(Command::Dir(change))
}

fn parse_led(args: &[&str]) -> Result<Command, ProtocolError> {
    let [target, mode] = args else {
        return Err(ProtocolError::Usage("LED needs target and mode".into()));
    };
    let mode_word = *mode;
    let mode = LedMode::parse(mode_word).ok_or_else(|| bad_value("LED mode", mode_word))?;
    match target.to_ascii_uppercase().as_str() {
        "SWEEP" => Ok(Command::Led(LedChannel::Sweep, mode)),
        "BOX" => Ok(Command::Led(LedChannel::Box, mode)),
        "ALL" if mode == LedMode::Off => Ok(Command::LedAllOff),
        "ALL" => Err(ProtocolError::Usage("LED ALL only supports OFF".into())),
        _ => Err(bad_value("LED target", target)),
    }
}

fn parse_led_config(channel: LedChannel, verb: &str, args: &[&str]) -> Result<Command, ProtocolError> {
    let [field, value] = args else {
        return Err(ProtocolError::Usage(format!("{} needs field and value", verb)));
    };
    let (field, min, max) = match field.to_ascii_uppercase().as_str() {
        "MIN" => (LedField::Min, 0, 255),
        "MAX" => (LedField::Max, 0, 255),
        "SPEED" => (LedField::Speed, 1, 10),
        _ => return Err(ProtocolError::UnknownSubcommand(format!("{} {}", verb, field))),
    };
    let label = format!("{} {}", verb, field_name(field));
    let parsed: i64 = value.parse().map_err(|_| bad_value(&label, value))?;
    if parsed < min || parsed > max {
        return Err(ProtocolError::OutOfRange {
            field: label,
            min,
            max,
        });
    }
    Ok(Command::LedConfig(channel, field, parsed as u8))
}

fn field_name(field: LedField) -> &'static str {
    match field {
        LedField::Min => "MIN",
        LedField::Max => "MAX",
        LedField::Speed => "SPEED",
    }
}

fn parse_mute(args: &[&str]) -> Result<Command, ProtocolError> {
    match args {
        [v] if v.eq_ignore_ascii_case("ON") => Ok(Command::Mute(true)),
        [v] if v.eq_ignore_ascii_case("OFF") => Ok(Command::Mute(false)),
        _ => Err(ProtocolError::Usage("MUTE needs ON/OFF".into())),
    }
}

fn parse_sound(args: &[&str]) -> Result<SoundCommand, ProtocolError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage("SOUND needs subcommand".into()))?;
    // file names may contain spaces
    let name = (!rest.is_empty()).then(|| rest.join(" "));

    match sub.to_ascii_uppercase().as_str() {
        "LIST" if rest.len() <= 1 => Ok(SoundCommand::List(name)),
        "LIST" => Err(ProtocolError::Usage("SOUND LIST takes at most a folder".into())),
        "PLAY" => Ok(SoundCommand::Play(name)),
        "SET" => name
            .map(SoundCommand::Set)
            .ok_or_else(|| ProtocolError::Usage("SOUND SET needs filename".into())),
        "CLEAR" if rest.is_empty() => Ok(SoundCommand::Clear),
        "STATUS" if rest.is_empty() => Ok(SoundCommand::Status),
        "CLEAR" | "STATUS" => Err(ProtocolError::Usage(format!(
            "SOUND {} takes no arguments",
            sub.to_ascii_uppercase()
        ))),
        _ => Err(ProtocolError::UnknownSubcommand("SOUND".into())),
    }
}

fn parse_fx(args: &[&str]) -> Result<FxCommand, ProtocolError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage("FX needs subcommand".into()))?;

    match (sub.to_ascii_uppercase().as_str(), rest) {
        ("ENABLE", []) => Ok(FxCommand::Enable),
        ("DISABLE", []) => Ok(FxCommand::Disable),
        ("STATUS", []) => Ok(FxCommand::Status),
        ("SET", [param, value]) => {
            let field = FxField::parse(param)
                .ok_or_else(|| ProtocolError::UnknownSubcommand("FX SET param".into()))?;
            let value: f64 = value
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| bad_value(field.wire_name(), value))?;
            // range check here so a bad value never reaches the manager
            field.round(value)?;
            Ok(FxCommand::Set(field, value))
        }
        ("SET", _) => Err(ProtocolError::Usage("FX SET needs param and value".into())),
        ("PRESET", rest) => parse_fx_preset(rest),
        ("ENABLE" | "DISABLE" | "STATUS", _) => Err(ProtocolError::Usage(format!(
            "FX {} takes no arguments",
            sub.to_ascii_uppercase()
        ))),
        _ => Err(ProtocolError::UnknownSubcommand("FX".into())),
    }
}

fn parse_fx_preset(args: &[&str]) -> Result<FxCommand, ProtocolError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage("FX PRESET needs subcommand".into()))?;

    match (sub.to_ascii_uppercase().as_str(), rest) {
        ("LIST", []) => Ok(FxCommand::PresetList),
        ("INFO", [name]) => Ok(FxCommand::PresetInfo(name.to_ascii_uppercase())),
        ("INFO", _) => Err(ProtocolError::Usage("FX PRESET INFO needs preset name".into())),
        ("SET", [name]) => Ok(FxCommand::PresetSet(name.to_ascii_uppercase())),
        ("SET", _) => Err(ProtocolError::Usage("FX PRESET SET needs preset name".into())),
        ("SAVE", [name, category]) => {
            let category = PresetCategory::parse(category)
                .ok_or_else(|| bad_value("FX PRESET SAVE category", category))?;
            Ok(FxCommand::PresetSave(name.to_ascii_uppercase(), category))
        }
        ("SAVE", _) => Err(ProtocolError::Usage(
            "FX PRESET SAVE needs name and category".into(),
        )),
        ("LIST", _) => Err(ProtocolError::Usage("FX PRESET LIST takes no arguments".into())),
        _ => Err(ProtocolError::UnknownSubcommand("FX PRESET".into())),
    }
}

fn parse_events(args: &[&str]) -> Result<Command, ProtocolError> {
    match args {
        [] => Ok(Command::Events(DEFAULT_EVENT_COUNT)),
        [n] => {
            let count: usize = n.parse().map_err(|_| bad_value("EVENTS", n))?;
            if count == 0 || count > ACTIVITY_LOG_CAPACITY {
                return Err(ProtocolError::OutOfRange {
                    field: "EVENTS".into(),
                    min: 1,
                    max: ACTIVITY_LOG_CAPACITY as i64,
                });
            }
            Ok(Command::Events(count))
        }
        _ => Err(ProtocolError::Usage("EVENTS takes an optional count".into())),
    }
}

fn parse_mixer(args: &[&str]) -> Result<MixerCommand, ProtocolError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage("MIXER needs subcommand".into()))?;

    match (sub.to_ascii_uppercase().as_str(), rest) {
        ("STATUS", []) => Ok(MixerCommand::Status),
        ("SET", [field, value]) => {
            let setting = match field.to_ascii_uppercase().as_str() {
                "SPEAKER_VOL" => {
                    MixerSetting::SpeakerVolume(volume("SPEAKER_VOL", value, SPEAKER_VOLUME_MAX)?)
                }
                "MIC_VOL" => MixerSetting::MicVolume(volume("MIC_VOL", value, MIC_VOLUME_MAX)?),
                "AUTO_GAIN" => match value.to_ascii_uppercase().as_str() {
                    "ON" => MixerSetting::AutoGain(true),
                    "OFF" => MixerSetting::AutoGain(false),
                    _ => return Err(ProtocolError::Usage("AUTO_GAIN needs ON/OFF".into())),
                },
                _ => return Err(ProtocolError::UnknownSubcommand("MIXER SET field".into())),
            };
            Ok(MixerCommand::Set(setting))
        }
        ("SET", _) => Err(ProtocolError::Usage("MIXER SET needs field and value".into())),
        ("STATUS", _) => Err(ProtocolError::Usage("MIXER STATUS takes no arguments".into())),
        _ => Err(ProtocolError::UnknownSubcommand("MIXER".into())),
    }
}

fn volume(field: &str, value: &str, max: u8) -> Result<u8, ProtocolError> {
    let level: i64 = value.parse().map_err(|_| bad_value(field, value))?;
    if !(0..=i64::from(max)).contains(&level) {
        return Err(ProtocolError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: max.into(),
        });
    }
    Ok(level as u8)
}

fn parse_fm(args: &[&str]) -> Result<Command, ProtocolError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage("FM needs subcommand".into()))?;
    if !sub.eq_ignore_ascii_case("TUNE") {
        return Err(ProtocolError::UnknownSubcommand("FM".into()));
    }
    let [value] = rest else {
        return Err(ProtocolError::Usage("FM TUNE needs frequency (MHz)".into()));
    };
    let mhz: f64 = value
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| bad_value("FM TUNE", value))?;
    let khz = (mhz * 1000.0).round();
    if khz < f64::from(FM_TUNE_MIN_KHZ) || khz > f64::from(FM_TUNE_MAX_KHZ) {
        return Err(ProtocolError::Usage(
            "FM TUNE frequency range 76.0-108.0 MHz".into(),
        ));
    }
    Ok(Command::FmTune(khz as u32))
}

fn parse_alert(device: DeviceClass, args: &[&str]) -> Result<Command, ProtocolError> {
    let verb = device.verb();
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ProtocolError::Usage(format!("{} needs subcommand", verb)))?;

    let command = match sub.to_ascii_uppercase().as_str() {
        "SOUND" if rest.is_empty() => {
            return Err(ProtocolError::Usage(format!("{} SOUND needs filename", verb)))
        }
        // file names may contain spaces
        "SOUND" => AlertCommand::Sound(rest.join(" ")),
        "SOUNDS" if rest.is_empty() => AlertCommand::Sounds,
        "SOUNDS" => {
            return Err(ProtocolError::Usage(format!("{} SOUNDS takes no arguments", verb)))
        }
        _ => return Err(ProtocolError::UnknownSubcommand(verb.into())),
    };
    Ok(Command::Alert(device, command))
}

fn bad_value(field: &str, value: &str) -> ProtocolError {
    ProtocolError::BadValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_verbs_case_insensitive() {
        assert_eq!(parse("status"), Ok(Command::Status));
        assert_eq!(parse("  Ping \r\n"), Ok(Command::Ping));
        assert_eq!(parse("CMD: START"), Ok(Command::Start));
        assert_eq!(parse("cmd:stop"), Ok(Command::Stop));
    }

    #[test]
    fn test_mixer_commands() {
        assert_eq!(parse("mixer status"), Ok(Command::Mixer(MixerCommand::Status)));
        assert_eq!(
            parse("MIXER SET SPEAKER_VOL 37"),
            Ok(Command::Mixer(MixerCommand::Set(MixerSetting::SpeakerVolume(37))))
        );
        assert_eq!(
            parse("MIXER SET auto_gain on"),
            Ok(Command::Mixer(MixerCommand::Set(MixerSetting::AutoGain(true))))
        );
        assert_eq!(
            parse("MIXER SET MIC_VOL 36").unwrap_err().to_string(),
            "MIC_VOL range 0 to 35"
        );
        assert!(matches!(parse("MIXER SET SPEAKER_VOL -1"), Err(ProtocolError::OutOfRange { .. })));
        assert!(matches!(parse("MIXER SET AUTO_GAIN maybe"), Err(ProtocolError::Usage(_))));
        assert!(matches!(parse("MIXER SET BASS 3"), Err(ProtocolError::UnknownSubcommand(_))));
        assert!(matches!(parse("MIXER"), Err(ProtocolError::Usage(_))));
        assert_eq!(parse("MIC STATUS"), Ok(Command::MicStatus));
        assert!(parse("MIC GAIN 10").is_err());
    }

    #[test]
    fn test_fm_tune() {
        assert_eq!(parse("FM TUNE 101.1"), Ok(Command::FmTune(101_100)));
        assert_eq!(parse("fm tune 76"), Ok(Command::FmTune(76_000)));
        assert_eq!(
            parse("FM TUNE 108.5").unwrap_err().to_string(),
            "FM TUNE frequency range 76.0-108.0 MHz"
        );
        assert!(matches!(parse("FM TUNE NaN"), Err(ProtocolError::BadValue { .. })));
        assert!(matches!(parse("FM TUNE"), Err(ProtocolError::Usage(_))));
        assert!(matches!(parse("FM TEST 99.9"), Err(ProtocolError::UnknownSubcommand(_))));
    }

    #[test]
    fn test_alert_sound_commands() {
        assert_eq!(
            parse("REMPOD SOUND deep beep.wav"),
            Ok(Command::Alert(DeviceClass::Rempod, AlertCommand::Sound("deep beep.wav".into())))
        );
        assert_eq!(
            parse("musicbox sounds"),
            Ok(Command::Alert(DeviceClass::Musicbox, AlertCommand::Sounds))
        );
        assert_eq!(
            parse("REMPOD SOUND").unwrap_err().to_string(),
            "REMPOD SOUND needs filename"
        );
        assert!(matches!(parse("MUSICBOX ARM"), Err(ProtocolError::UnknownSubcommand(_))));
    }

    #[test]
    fn test_multibyte_start_is_unknown_verb() {
        assert_eq!(parse("€€ START"), Err(ProtocolError::UnknownVerb("€€".into())));
        assert_eq!(parse("€"), Err(ProtocolError::UnknownVerb("€".into())));
        assert_eq!(parse("CMD:€ STOP"), Err(ProtocolError::UnknownVerb("€".into())));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(""), Err(ProtocolError::Empty));
        assert_eq!(parse("JUMP"), Err(ProtocolError::UnknownVerb("JUMP".into())));
        assert!(matches!(parse("START now"), Err(ProtocolError::Usage(_))));
        assert!(matches!(parse("SPEED"), Err(ProtocolError::Usage(_))));
        assert!(matches!(parse("SPEED fast"), Err(ProtocolError::BadValue { .. })));
        assert!(matches!(parse("SPEED 0"), Err(ProtocolError::OutOfRange { .. })));
        assert!(matches!(parse("DIR SIDEWAYS"), Err(ProtocolError::BadValue { .. })));
    }

    #[test]
    fn test_speed_and_dir() {
        assert_eq!(parse("SPEED 175"), Ok(Command::Speed(175)));
        assert_eq!(parse("dir toggle"), Ok(Command::Dir(DirChange::Toggle)));
    }

    #[test]
    fn test_led_commands() {
        assert_eq!(
            parse("LED BOX heartbeat"),
            Ok(Command::Led(LedChannel::Box, LedMode::Heartbeat))
        );
        assert_eq!(parse("LED ALL OFF"), Ok(Command::LedAllOff));
        assert!(parse("LED ALL ON").is_err());
        assert!(parse("LED ROOF on").is_err());
        assert!(parse("LED SWEEP disco").is_err());
        assert_eq!(
            parse("SWEEP_CFG max 200"),
            Ok(Command::LedConfig(LedChannel::Sweep, LedField::Max, 200))
        );
        assert_eq!(
            parse("BOX_CFG SPEED 11").unwrap_err().to_string(),
            "BOX_CFG SPEED range 1 to 10"
        );
    }

    #[test]
    fn test_sound_names_keep_spaces() {
        assert_eq!(
            parse("SOUND SET Startup/deep voice.wav"),
            Ok(Command::Sound(SoundCommand::Set("Startup/deep voice.wav".into())))
        );
        assert_eq!(parse("SOUND PLAY"), Ok(Command::Sound(SoundCommand::Play(None))));
        assert_eq!(
            parse("sound list rempod"),
            Ok(Command::Sound(SoundCommand::List(Some("rempod".into()))))
        );
        assert!(parse("SOUND SET").is_err());
    }

    #[test]
    fn test_fx_set_validates_range() {
        assert_eq!(
            parse("FX SET bp_low 700"),
            Ok(Command::Fx(FxCommand::Set(FxField::BpLow, 700.0)))
        );
        assert_eq!(
            parse("FX SET PRE_GAIN -30").unwrap_err().to_string(),
            "PRE_GAIN range -24 to 0"
        );
        assert!(matches!(parse("FX SET REVERB loud"), Err(ProtocolError::BadValue { .. })));
        assert!(matches!(parse("FX SET VOLUME 3"), Err(ProtocolError::UnknownSubcommand(_))));
        assert!(matches!(parse("FX SET REVERB"), Err(ProtocolError::Usage(_))));
    }

    #[test]
    fn test_fx_preset_commands() {
        assert_eq!(
            parse("FX PRESET SET sb7_classic"),
            Ok(Command::Fx(FxCommand::PresetSet("SB7_CLASSIC".into())))
        );
        assert_eq!(
            parse("FX PRESET SAVE attic fm"),
            Ok(Command::Fx(FxCommand::PresetSave("ATTIC".into(), PresetCategory::Fm)))
        );
        assert!(parse("FX PRESET SAVE attic radio").is_err());
        assert_eq!(parse("FX PRESET LIST"), Ok(Command::Fx(FxCommand::PresetList)));
        assert!(parse("FX PRESET").is_err());
    }

    #[test]
    fn test_events_count() {
        assert_eq!(parse("EVENTS"), Ok(Command::Events(DEFAULT_EVENT_COUNT)));
        assert_eq!(parse("EVENTS 5"), Ok(Command::Events(5)));
        assert!(parse("EVENTS 0").is_err());
    }

    #[test]
    fn test_reply_format() {
        assert_eq!(Reply::ok("").to_string(), "OK");
        assert_eq!(Reply::ok("SPEED 150").to_string(), "OK SPEED 150");
        assert_eq!(Reply::from(ProtocolError::LineTooLong).to_string(), "ERR line too long");
    }
}
