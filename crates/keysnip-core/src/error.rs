use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeysnipError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The keystroke synthesis controller could not be created or refused an event.
    #[error("Keyboard controller error: {0}")]
    Keyboard(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Keystroke observation is not permitted for this process.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Keystroke observation disabled: {0}")]
    ObservationDisabled(String),

    /// Deletion or injection keystrokes could not be delivered to the target.
    #[error("Injection failed: {0}")]
    Injection(String),

    #[error("Engine state error: {0}")]
    EngineState(String),

    #[error("Error: {0}")]
    Other(String),
}

impl KeysnipError {
    /// Whether this error means the target surface could not be edited.
    pub fn is_injection_failure(&self) -> bool {
        matches!(
            self,
            KeysnipError::Keyboard(_) | KeysnipError::Clipboard(_) | KeysnipError::Injection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, KeysnipError>;
