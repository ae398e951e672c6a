use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::DEFAULT_SEARCH_LIMIT;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 30;
pub const DEFAULT_WATCH_DEBOUNCE_SECS: u64 = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrooveConfig {
    pub version: u32,
    pub coalesce_window_ms: u64,
    pub search_limit: usize,
    pub audio_extensions: Vec<String>,
    pub watch_music: bool,
    pub watch_debounce_secs: u64,
}

impl Default for GrooveConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW_MS,
            search_limit: DEFAULT_SEARCH_LIMIT,
            audio_extensions: ["mp3", "flac", "ogg", "opus", "m4a", "wav", "aac"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            watch_music: false,
            watch_debounce_secs: DEFAULT_WATCH_DEBOUNCE_SECS,
        }
    }
}

impl GrooveConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_secs(self.watch_debounce_secs)
    }

    pub fn is_audio_extension(&self, ext: &str) -> bool {
        self.audio_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.coalesce_window_ms == 0 {
            self.coalesce_window_ms = DEFAULT_COALESCE_WINDOW_MS;
        }
        if self.search_limit == 0 {
            self.search_limit = DEFAULT_SEARCH_LIMIT;
        }
        if self.watch_debounce_secs == 0 {
            self.watch_debounce_secs = DEFAULT_WATCH_DEBOUNCE_SECS;
        }
        self.audio_extensions = self
            .audio_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if self.audio_extensions.is_empty() {
            self.audio_extensions = GrooveConfig::default().audio_extensions;
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("GROOVE_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("groove.yaml"))
            .unwrap_or_else(|| PathBuf::from("groove.yaml")),
        Err(_) => PathBuf::from("groove.yaml"),
    }
}

/// Loads the config at `path`, writing the defaults there first when it does
/// not exist. The flag is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(GrooveConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: GrooveConfig = if contents.trim().is_empty() {
            GrooveConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.normalize();
        return Ok((config, false));
    }

    let config = GrooveConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &GrooveConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, save_config, GrooveConfig};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("groove.yaml");
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert_eq!(config, GrooveConfig::default());
        assert!(path.exists());

        let (again, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(again, config);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groove.yaml");
        fs::write(
            &path,
            "coalesce_window_ms: 0\nsearch_limit: 0\naudio_extensions: [\".MP3\", \" \"]\n",
        )
        .unwrap();
        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.coalesce_window(), Duration::from_millis(30));
        assert_eq!(config.search_limit, 7);
        assert_eq!(config.audio_extensions, vec!["mp3".to_string()]);
        assert!(config.is_audio_extension("MP3"));
        assert!(!config.is_audio_extension("txt"));
    }

    #[test]
    fn saved_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groove.yaml");
        let config = GrooveConfig {
            coalesce_window_ms: 15,
            watch_music: true,
            ..GrooveConfig::default()
        };
        save_config(&path, &config).unwrap();
        let (loaded, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(loaded, config);
    }
}
