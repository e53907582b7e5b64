//! Configuration management for cookalong

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::language::DEFAULT_LANGUAGE;
use crate::{Error, Result};

pub use file::CookalongConfigFile;

/// Cookalong configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Language code for narration and the start command
    pub language: String,

    /// Target servings; `None` cooks the recipe as written
    pub servings: Option<u32>,

    /// Narration configuration
    pub speech: SpeechConfig,

    /// Voice command listener configuration
    pub listener: ListenerConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Path to data directory (ratings store)
    pub data_dir: PathBuf,

    /// Taste ratings store
    pub feedback_path: PathBuf,
}

/// Narration backend preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsProvider {
    /// Built-in synthesizer only
    #[default]
    Local,
    OpenAi,
    ElevenLabs,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!(
                "unknown TTS provider '{other}' (expected local, openai or elevenlabs)"
            ))),
        }
    }
}

/// Narration configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub provider: TtsProvider,

    /// Cloud voice identifier; provider default when unset
    pub voice: Option<String>,

    /// Cloud model; provider default when unset
    pub model: Option<String>,

    /// Speaking rate multiplier
    pub rate: f64,

    pub pitch: f64,

    /// Output volume, 0.0 to 1.0
    pub volume: f64,

    /// Language tags the local synthesizer advertises
    pub local_voices: Vec<String>,

    /// Local synthesizer pacing at rate 1.0
    pub words_per_second: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::Local,
            voice: None,
            model: None,
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            local_voices: vec![DEFAULT_LANGUAGE.to_string()],
            words_per_second: 2.5,
        }
    }
}

/// Voice command listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Automatic restarts before degrading to manual control
    pub max_attempts: u32,

    /// Minimum spacing between automatic restarts
    pub min_restart_interval: Duration,

    /// Whether microphone access is granted
    pub microphone: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_restart_interval: Duration::from_millis(1000),
            microphone: true,
        }
    }
}

/// API keys for cloud voices
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Return the data directory: `~/.local/share/cookalong` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from(".cookalong"), |d| d.data_dir().join("cookalong"))
}

impl Config {
    /// Load configuration from the standard config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        Self::from_sources(file::load_config_file_from(path), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn from_sources<F>(fc: CookalongConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let language = env("COOKALONG_LANGUAGE")
            .or(fc.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let servings = match env("COOKALONG_SERVINGS") {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("COOKALONG_SERVINGS must be a whole number: {e}"))
            })?),
            None => fc.servings,
        }
        .filter(|&n| n > 0);

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let defaults = SpeechConfig::default();
        let provider = env("COOKALONG_TTS_PROVIDER")
            .or(fc.speech.provider)
            .map(|p| p.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or_default();
        let speech = SpeechConfig {
            provider,
            voice: fc.speech.voice,
            model: fc.speech.model,
            rate: positive("speech.rate", fc.speech.rate, defaults.rate)?,
            pitch: positive("speech.pitch", fc.speech.pitch, defaults.pitch)?,
            volume: fc.speech.volume.unwrap_or(defaults.volume).clamp(0.0, 1.0),
            local_voices: fc
                .speech
                .local_voices
                .filter(|voices| !voices.is_empty())
                .unwrap_or(defaults.local_voices),
            words_per_second: positive(
                "speech.words_per_second",
                fc.speech.words_per_second,
                defaults.words_per_second,
            )?,
        };

        let listener_defaults = ListenerConfig::default();
        let listener = ListenerConfig {
            max_attempts: fc.listener.max_attempts.unwrap_or(listener_defaults.max_attempts),
            min_restart_interval: fc
                .listener
                .min_restart_interval_ms
                .map_or(listener_defaults.min_restart_interval, Duration::from_millis),
            microphone: fc.listener.microphone.unwrap_or(listener_defaults.microphone),
        };

        let data_dir = env("COOKALONG_DATA_DIR").map_or_else(default_data_dir, PathBuf::from);
        let feedback_path = fc
            .feedback
            .path
            .map_or_else(|| data_dir.join("ratings.jsonl"), PathBuf::from);

        Ok(Self {
            language,
            servings,
            speech,
            listener,
            api_keys,
            data_dir,
            feedback_path,
        })
    }

    /// API key for the configured cloud provider, if any
    #[must_use]
    pub fn cloud_api_key(&self) -> Option<&str> {
        match self.speech.provider {
            TtsProvider::Local => None,
            TtsProvider::OpenAi => self.api_keys.openai.as_deref(),
            TtsProvider::ElevenLabs => self.api_keys.elevenlabs.as_deref(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            servings: None,
            speech: SpeechConfig::default(),
            listener: ListenerConfig::default(),
            api_keys: ApiKeys::default(),
            feedback_path: data_dir.join("ratings.jsonl"),
            data_dir,
        }
    }
}

fn positive(name: &str, value: Option<f64>, default: f64) -> Result<f64> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(Error::Config(format!("{name} must be positive, got {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file(toml: &str) -> CookalongConfigFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(CookalongConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.language, "en-US");
        assert_eq!(config.servings, None);
        assert_eq!(config.speech.provider, TtsProvider::Local);
        assert!((config.speech.rate - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.listener.max_attempts, 5);
        assert_eq!(config.listener.min_restart_interval, Duration::from_secs(1));
        assert!(config.listener.microphone);
        assert!(config.feedback_path.ends_with("ratings.jsonl"));
    }

    #[test]
    fn env_overrides_file() {
        let fc = file(
            r#"
            language = "fr-FR"
            servings = 3
            [speech]
            provider = "elevenlabs"
            [api_keys]
            openai = "from-file"
            "#,
        );
        let env = env_of(&[
            ("COOKALONG_LANGUAGE", "hi-IN"),
            ("COOKALONG_TTS_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "from-env"),
        ]);

        let config = Config::from_sources(fc, env).unwrap();
        assert_eq!(config.language, "hi-IN");
        assert_eq!(config.servings, Some(3));
        assert_eq!(config.speech.provider, TtsProvider::OpenAi);
        assert_eq!(config.cloud_api_key(), Some("from-env"));
    }

    #[test]
    fn file_overrides_defaults() {
        let fc = file(
            r#"
            [listener]
            max_attempts = 2
            min_restart_interval_ms = 1500
            microphone = false
            [feedback]
            path = "/tmp/cookalong-ratings.jsonl"
            "#,
        );
        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(config.listener.max_attempts, 2);
        assert_eq!(config.listener.min_restart_interval, Duration::from_millis(1500));
        assert!(!config.listener.microphone);
        assert_eq!(config.feedback_path, PathBuf::from("/tmp/cookalong-ratings.jsonl"));
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_servings = Config::from_sources(
            CookalongConfigFile::default(),
            env_of(&[("COOKALONG_SERVINGS", "lots")]),
        );
        assert!(matches!(bad_servings, Err(Error::Config(_))));

        let bad_provider = Config::from_sources(
            CookalongConfigFile::default(),
            env_of(&[("COOKALONG_TTS_PROVIDER", "parrot")]),
        );
        assert!(bad_provider.is_err());

        let bad_rate = Config::from_sources(file("[speech]\nrate = -1.0"), env_of(&[]));
        assert!(bad_rate.is_err());
    }

    #[test]
    fn zero_servings_means_recipe_default() {
        let config = Config::from_sources(
            CookalongConfigFile::default(),
            env_of(&[("COOKALONG_SERVINGS", "0")]),
        )
        .unwrap();
        assert_eq!(config.servings, None);
    }

    #[test]
    fn local_provider_has_no_cloud_key() {
        let config = Config::from_sources(
            CookalongConfigFile::default(),
            env_of(&[("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();
        assert_eq!(config.cloud_api_key(), None);
    }
}
