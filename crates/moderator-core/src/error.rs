//! Error types for the focus-group moderator core.

use thiserror::Error;

/// Result type alias for moderator operations.
pub type ModeratorResult<T> = Result<T, ModeratorError>;

/// Errors that can occur while running a moderated session.
#[derive(Error, Debug)]
pub enum ModeratorError {
    #[error("discussion plan load failed: {0}")]
    PlanLoad(String),

    #[error("control-plane request failed: {0}")]
    ControlPlane(String),

    #[error("text-to-speech failed: {0}")]
    Tts(String),

    #[error("audio room input switch failed: {0}")]
    AudioRoomSwitch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ModeratorError {
    fn from(err: reqwest::Error) -> Self {
        ModeratorError::ControlPlane(err.to_string())
    }
}
