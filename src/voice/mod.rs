//! Voice announcements

pub mod announcer;
pub mod library;

pub use announcer::Announcer;
pub use library::{SoundLibrary, SOUND_FOLDERS};
