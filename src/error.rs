//! Error types for the hub daemon

use thiserror::Error;

/// Main error type for the daemon
#[derive(Error, Debug)]
pub enum Error {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Audio routing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hardware driver errors
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("I2C error: {0}")]
    I2c(String),

    #[error("LED write failed: {0}")]
    LedWrite(String),

    #[error("Mixer command failed: {0}")]
    Mixer(String),

    #[error("Hardware operation timed out")]
    Timeout,

    #[error("Driver task failed: {0}")]
    Task(String),
}

/// Audio routing process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Failed to spawn routing process: {0}")]
    SpawnFailed(String),

    #[error("Routing process exited immediately with {0}")]
    ExitedEarly(String),

    #[error("Signal delivery failed: {0}")]
    Signal(String),

    #[error("busy")]
    Busy,

    #[error("Supervisor is not running")]
    SupervisorGone,
}

/// Announcement playback errors
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Sound not found: {0}")]
    NotFound(String),

    #[error("Invalid sound name: {0}")]
    InvalidName(String),

    #[error("Unsupported sound format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown sound folder: {0}")]
    UnknownFolder(String),

    #[error("Player failed: {0}")]
    Player(String),

    #[error("Playback timed out after {0}s")]
    Timeout(u64),

    #[error("No startup sound configured")]
    NoStartupSound,
}

/// Command protocol errors
///
/// The `Display` text is what goes after `ERR ` on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command {0}")]
    UnknownVerb(String),

    #[error("{0} unknown subcommand")]
    UnknownSubcommand(String),

    #[error("{0}")]
    Usage(String),

    #[error("{field} bad value {value}")]
    BadValue { field: String, value: String },

    #[error("{field} range {min} to {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("line too long")]
    LineTooLong,
}

/// Satellite ingest errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Connection closed before a full line was received")]
    Truncated,

    #[error("Event line exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Timed out waiting for event")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read snapshot {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("Failed to write snapshot {path}: {source}")]
    Write { path: String, source: std::io::Error },

    #[error("Snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// Result type alias for the daemon
pub type Result<T> = std::result::Result<T, Error>;
