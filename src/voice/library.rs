//! Sound file lookup
//!
//! Sounds live under one root with four well-known subfolders. A bare file
//! name is searched in `Announcements`, `Startup`, `RemPod`, `MusicBox` and
//! then the root itself; `Folder/name.wav` addresses one folder directly.

use std::path::{Path, PathBuf};

use crate::config::VoiceConfig;
use crate::constants::SUPPORTED_SOUND_EXTENSIONS;
use crate::error::VoiceError;

/// Subfolders in lookup order
pub const SOUND_FOLDERS: [&str; 4] = ["Announcements", "Startup", "RemPod", "MusicBox"];

#[derive(Debug, Clone)]
pub struct SoundLibrary {
    root: PathBuf,
}

impl SoundLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the file for `name`
    pub fn resolve(&self, name: &str) -> Result<PathBuf, VoiceError> {
        validate_name(name)?;

        if let Some((folder, file)) = name.split_once('/') {
            let folder = canonical_folder(folder)
                .ok_or_else(|| VoiceError::UnknownFolder(folder.to_string()))?;
            let path = self.root.join(folder).join(file);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(VoiceError::NotFound(name.to_string()))
            };
        }

        SOUND_FOLDERS
            .iter()
            .map(|folder| self.root.join(folder).join(name))
            .chain(std::iter::once(self.root.join(name)))
            .find(|path| path.is_file())
            .ok_or_else(|| VoiceError::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Sorted, de-duplicated playable file names, from one folder or from
    /// the root and every folder
    pub fn list(&self, folder: Option<&str>) -> Result<Vec<String>, VoiceError> {
        let dirs: Vec<PathBuf> = match folder {
            Some(folder) => {
                let folder = canonical_folder(folder)
                    .ok_or_else(|| VoiceError::UnknownFolder(folder.to_string()))?;
                vec![self.root.join(folder)]
            }
            None => std::iter::once(self.root.clone())
                .chain(SOUND_FOLDERS.iter().map(|f| self.root.join(f)))
                .collect(),
        };

        let mut names: Vec<String> = dirs
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flat_map(|entries| entries.filter_map(|e| e.ok()))
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_supported(Path::new(name)))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Player argv for `path`, with the path appended
pub fn player_command(path: &Path, voice: &VoiceConfig) -> Result<Vec<String>, VoiceError> {
    let ext = extension(path);
    let player = match ext.as_deref() {
        Some("wav") => &voice.wav_player,
        Some("mp3") => &voice.mp3_player,
        _ => return Err(VoiceError::UnsupportedFormat(path.display().to_string())),
    };
    if player.is_empty() {
        return Err(VoiceError::Player(format!("no player configured for {}", path.display())));
    }
    let mut argv = player.clone();
    argv.push(path.display().to_string());
    Ok(argv)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_supported(path: &Path) -> bool {
    extension(path)
        .map(|ext| SUPPORTED_SOUND_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn canonical_folder(folder: &str) -> Option<&'static str> {
    SOUND_FOLDERS
        .iter()
        .copied()
        .find(|f| f.eq_ignore_ascii_case(folder))
}

fn validate_name(name: &str) -> Result<(), VoiceError> {
    let invalid = || VoiceError::InvalidName(name.to_string());
    if name.is_empty() || name.starts_with('/') || name.contains('\\') || name.contains('\0') {
        return Err(invalid());
    }
    if name.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(invalid());
    }
    if name.matches('/').count() > 1 {
        return Err(invalid());
    }
    if !is_supported(Path::new(name)) {
        return Err(VoiceError::UnsupportedFormat(name.to_string()));
    }
    Ok(())
}
