use std::{fs, io, path::PathBuf};

use log::{debug, info};
use readily_engine::{ReaderSettings, settings::SettingsStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub(super) enum SettingsFileError {
    #[error("settings file io: {0}")]
    Io(#[from] io::Error),
    #[error("settings file is not valid: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// On-disk shape of the reader settings. Missing keys keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    wpm: u16,
    min_wpm: u16,
    max_wpm: u16,
    chunk_size: usize,
    pause_on_punctuation: bool,
    auto_scroll: bool,
}

impl Default for SettingsFile {
    fn default() -> Self {
        ReaderSettings::default().into()
    }
}

impl From<ReaderSettings> for SettingsFile {
    fn from(settings: ReaderSettings) -> Self {
        Self {
            wpm: settings.wpm,
            min_wpm: settings.min_wpm,
            max_wpm: settings.max_wpm,
            chunk_size: settings.chunk_size,
            pause_on_punctuation: settings.pause_on_punctuation,
            auto_scroll: settings.auto_scroll_enabled,
        }
    }
}

impl From<SettingsFile> for ReaderSettings {
    fn from(file: SettingsFile) -> Self {
        Self {
            wpm: file.wpm,
            min_wpm: file.min_wpm,
            max_wpm: file.max_wpm,
            chunk_size: file.chunk_size,
            pause_on_punctuation: file.pause_on_punctuation,
            auto_scroll_enabled: file.auto_scroll,
        }
    }
}

/// TOML settings file; a missing file means defaults.
pub(super) struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub(super) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsStore for FileSettingsStore {
    type Error = SettingsFileError;

    fn load(&mut self) -> Result<Option<ReaderSettings>, Self::Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("settings: {} not found", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        parse_settings(&text).map(Some)
    }

    fn save(&mut self, settings: &ReaderSettings) -> Result<(), Self::Error> {
        fs::write(&self.path, format_settings(settings)?)?;
        info!(
            "settings: saved wpm={} auto_scroll={} path={}",
            settings.wpm,
            settings.auto_scroll_enabled,
            self.path.display()
        );
        Ok(())
    }
}

pub(super) fn parse_settings(text: &str) -> Result<ReaderSettings, SettingsFileError> {
    let file: SettingsFile = toml::from_str(text)?;
    Ok(ReaderSettings::from(file).normalized())
}

pub(super) fn format_settings(settings: &ReaderSettings) -> Result<String, SettingsFileError> {
    Ok(toml::to_string(&SettingsFile::from(*settings))?)
}

/// What gets written back: the stored settings with only the fields the reader
/// changed during this run laid over them. Command-line overrides never persist.
pub(super) fn with_reader_edits(
    stored: ReaderSettings,
    run: ReaderSettings,
    live_wpm: u16,
    live_auto_scroll: bool,
) -> ReaderSettings {
    let mut persisted = stored;
    if live_wpm != run.wpm {
        persisted.wpm = live_wpm;
    }
    if live_auto_scroll != run.auto_scroll_enabled {
        persisted.auto_scroll_enabled = live_auto_scroll;
    }
    persisted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let settings = parse_settings("# reader\nwpm = 450\n\nauto_scroll = false\n").unwrap();
        assert_eq!(settings.wpm, 450);
        assert!(!settings.auto_scroll_enabled);
        assert_eq!(settings.chunk_size, ReaderSettings::default().chunk_size);
    }

    #[test]
    fn out_of_range_speed_is_clamped() {
        let settings = parse_settings("min_wpm = 200\nmax_wpm = 400\nwpm = 900\n").unwrap();
        assert_eq!(settings.wpm, 400);
    }

    #[test]
    fn invalid_files_are_rejected() {
        assert!(matches!(
            parse_settings("wpm = 300\nspeed\n"),
            Err(SettingsFileError::Parse(_))
        ));
        assert!(matches!(
            parse_settings("wpm = \"fast\"\n"),
            Err(SettingsFileError::Parse(_))
        ));
        assert!(matches!(
            parse_settings("wpm = -5\n"),
            Err(SettingsFileError::Parse(_))
        ));

        let unknown = parse_settings("theme = \"dark\"\n").unwrap_err();
        assert!(unknown.to_string().contains("theme"));
    }

    #[test]
    fn saved_file_loads_back() {
        let settings = ReaderSettings {
            wpm: 520,
            pause_on_punctuation: false,
            ..ReaderSettings::default()
        };
        let text = format_settings(&settings).unwrap();
        assert!(text.contains("wpm = 520"));
        assert_eq!(parse_settings(&text).unwrap(), settings);
    }

    #[test]
    fn missing_file_reads_as_defaults() {
        let mut store = FileSettingsStore::new(PathBuf::from("/nonexistent/readily/settings.toml"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn command_line_overrides_are_not_persisted() {
        let stored = ReaderSettings::default();
        let run = ReaderSettings {
            wpm: 500,
            chunk_size: 50,
            pause_on_punctuation: false,
            ..stored
        };

        // Nothing edited while reading: the stored file is left as it was.
        assert_eq!(with_reader_edits(stored, run, 500, true), stored);

        let persisted = with_reader_edits(stored, run, 510, false);
        assert_eq!(persisted.wpm, 510);
        assert!(!persisted.auto_scroll_enabled);
        assert_eq!(persisted.chunk_size, stored.chunk_size);
        assert!(persisted.pause_on_punctuation);
    }
}
