//! TOML configuration file loading
//!
//! Supports `~/.config/cookalong/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CookalongConfigFile {
    /// Language code (e.g. "hi-IN")
    #[serde(default)]
    pub language: Option<String>,

    /// Default target servings
    #[serde(default)]
    pub servings: Option<u32>,

    /// Narration configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Voice command listener configuration
    #[serde(default)]
    pub listener: ListenerFileConfig,

    /// API keys for cloud voices
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Taste feedback configuration
    #[serde(default)]
    pub feedback: FeedbackFileConfig,
}

/// Narration configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// "local", "openai" or "elevenlabs"
    pub provider: Option<String>,

    /// Cloud voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Cloud model (e.g. "tts-1")
    pub model: Option<String>,

    pub rate: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,

    /// Language tags the local synthesizer can speak
    pub local_voices: Option<Vec<String>>,

    /// Local synthesizer pacing
    pub words_per_second: Option<f64>,
}

/// Voice command listener configuration
#[derive(Debug, Default, Deserialize)]
pub struct ListenerFileConfig {
    /// Automatic restarts before falling back to manual control
    pub max_attempts: Option<u32>,

    /// Minimum spacing between automatic restarts
    pub min_restart_interval_ms: Option<u64>,

    /// Whether microphone access is granted
    pub microphone: Option<bool>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Taste feedback configuration
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackFileConfig {
    /// Ratings store path
    pub path: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CookalongConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> CookalongConfigFile {
    config_file_path().map_or_else(CookalongConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Falls back to defaults (with a warning) when the file can't be read or parsed.
#[must_use]
pub fn load_config_file_from(path: &Path) -> CookalongConfigFile {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return CookalongConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CookalongConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CookalongConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/cookalong/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cookalong").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: CookalongConfigFile = toml::from_str(
            r#"
            language = "ta-IN"

            [speech]
            provider = "openai"
            rate = 1.1

            [listener]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(fc.language.as_deref(), Some("ta-IN"));
        assert_eq!(fc.speech.provider.as_deref(), Some("openai"));
        assert_eq!(fc.listener.max_attempts, Some(3));
        assert!(fc.listener.microphone.is_none());
        assert!(fc.api_keys.openai.is_none());
    }

    #[test]
    fn missing_or_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config_file_from(&dir.path().join("nope.toml"));
        assert!(missing.language.is_none());

        let broken = dir.path().join("config.toml");
        std::fs::write(&broken, "language = [unterminated").unwrap();
        assert!(load_config_file_from(&broken).language.is_none());
    }
}
