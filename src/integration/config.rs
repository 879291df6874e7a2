//! Configuration for a chat session
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is fine.

use crate::llm::prompts::validate_template;
use crate::llm::Tone;
use crate::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Greeting seeded as the first assistant turn
pub const DEFAULT_GREETING: &str =
    "Hello! It's a pleasure to be here for this interview. I'm ready for your questions whenever you are.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// First assistant turn; `None` starts with an empty transcript
    pub greeting: Option<String>,

    /// Tone selected when the session opens
    pub default_tone: Tone,

    /// Whether replies are spoken when the session opens
    pub voice_reply_enabled: bool,

    /// Language prefix preferred when no voice is selected
    pub default_language_prefix: String,

    /// Language tag used for speech recognition
    pub recognition_language: String,

    /// Prompt template overriding the built-in one
    pub prompt_template: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_string()),
            default_tone: Tone::Professional,
            voice_reply_enabled: false,
            default_language_prefix: "en".to_string(),
            recognition_language: "en-US".to_string(),
            prompt_template: None,
        }
    }
}

impl SessionConfig {
    /// Default location: `<config dir>/colloquy/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("colloquy").join("config.toml"))
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: SessionConfig = toml::from_str(&content).map_err(|e| {
            ChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        info!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Start with an empty transcript
    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.default_tone = tone;
        self
    }

    pub fn with_voice_reply(mut self, enabled: bool) -> Self {
        self.voice_reply_enabled = enabled;
        self
    }

    pub fn with_language_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_language_prefix = prefix.into();
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_language_prefix.trim().is_empty() {
            return Err(ChatError::Config(
                "default_language_prefix must not be empty".to_string(),
            ));
        }

        if self.recognition_language.trim().is_empty() {
            return Err(ChatError::Config(
                "recognition_language must not be empty".to_string(),
            ));
        }

        if let Some(template) = &self.prompt_template {
            validate_template(template)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.default_tone, Tone::Professional);
        assert!(!config.voice_reply_enabled);
        assert_eq!(config.default_language_prefix, "en");
        assert!(config.greeting.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::default()
            .without_greeting()
            .with_tone(Tone::Casual)
            .with_voice_reply(true)
            .with_language_prefix("hi");

        assert!(config.greeting.is_none());
        assert_eq!(config.default_tone, Tone::Casual);
        assert!(config.voice_reply_enabled);
        assert_eq!(config.default_language_prefix, "hi");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_tone = \"reflective\"").unwrap();
        writeln!(file, "voice_reply_enabled = true").unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.default_tone, Tone::Reflective);
        assert!(config.voice_reply_enabled);
        assert_eq!(config.recognition_language, "en-US");
    }

    #[test]
    fn test_load_rejects_bad_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prompt_template = \"no slot here\"").unwrap();

        assert!(matches!(
            SessionConfig::load(file.path()),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_load_rejects_unknown_tone() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_tone = \"sarcastic\"").unwrap();

        assert!(SessionConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = SessionConfig::default().with_language_prefix("  ");
        assert!(config.validate().is_err());
    }
}
