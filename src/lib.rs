pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;

use thiserror::Error;

pub use integration::{
    ChatSession, MicrophoneStatus, Notification, NotificationSink, SessionConfig,
    SessionSnapshot, Severity, SubmitOutcome, ToggleOutcome,
};
pub use llm::{GenerationClient, GenerationRequest, GenerationResponse, Tone};
pub use messages::{Sender, Transcript, Turn};

#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::Io(e.to_string())
    }
}

impl ChatError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user can simply try again
            ChatError::Generation(_) => true,
            ChatError::Capture(_) => true,
            // These need a fix outside the session
            ChatError::Config(_) => false,
            ChatError::Io(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Generation(_) => "Failed to get a response. Please try again.".to_string(),
            ChatError::Capture(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            ChatError::Config(_) => "Configuration error. Please check settings.".to_string(),
            ChatError::Io(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ChatError::Generation("timeout".into()).is_recoverable());
        assert!(ChatError::Capture("no-speech".into()).is_recoverable());
        assert!(!ChatError::Config("bad template".into()).is_recoverable());
    }

    #[test]
    fn test_every_variant_has_a_user_message() {
        let errors = [
            ChatError::Generation("503".into()),
            ChatError::Capture("not-allowed".into()),
            ChatError::Config("bad".into()),
            ChatError::Io("gone".into()),
        ];
        for err in &errors {
            assert!(!err.user_message().is_empty(), "{}", err);
        }
        assert_eq!(errors[1].user_message(), "Speech recognition failed. Please try again.");
    }

    #[test]
    fn test_io_conversion() {
        let err: ChatError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ChatError::Io(_)));
        assert_eq!(err.user_message(), "File system error occurred.");
    }
}
