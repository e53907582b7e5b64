//! Error types for cookalong

use thiserror::Error;

/// Result type alias for cookalong operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running a cooking session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Recipe is malformed or cannot be cooked
    #[error("recipe error: {0}")]
    Recipe(String),

    /// Narration backend error
    #[error("speech error: {0}")]
    Speech(String),

    /// Cloud text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Taste feedback error (invalid rating, store failure)
    #[error("feedback error: {0}")]
    Feedback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
