//! Error types for Kino QoS

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter error types
///
/// None of these escape event dispatch; they are logged and the adapter
/// degrades to a no-op for the affected step.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No player instance bound to the adapter")]
    PlayerNotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlayerNotConnected => "PLAYER_NOT_CONNECTED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Serialization(_) => "SERIALIZATION",
        }
    }
}
