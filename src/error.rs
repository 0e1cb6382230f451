//! Error types for domovoy

use thiserror::Error;

/// Result type alias for domovoy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in domovoy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Lexicon file is malformed or inconsistent
    #[error("lexicon error: {0}")]
    Lexicon(String),

    /// Serial link to the LED controller failed
    #[error("serial error: {0}")]
    Serial(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Music player error
    #[error("music error: {0}")]
    Music(String),

    /// System action error (browser, shutdown)
    #[error("system error: {0}")]
    System(String),

    /// Speech output error
    #[error("speech error: {0}")]
    Speech(String),

    /// Screen sampling error
    #[error("screen error: {0}")]
    Screen(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Self::Serial(e.to_string())
    }
}
