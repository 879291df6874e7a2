//! Capability contracts for the platform's speech devices
//!
//! The session depends only on these traits, never on a concrete device,
//! so tests can substitute doubles that synthesize events deterministically.
//! Device callbacks come back to the session as [`PlatformEvent`]s.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A synthesis voice as reported by the platform, before deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVoice {
    /// Unique identifier of the voice
    pub uri: String,
    /// Vendor name, e.g. "Google UK English Female"
    pub name: String,
    /// BCP 47 language tag, e.g. "en-GB"
    pub lang: String,
}

impl PlatformVoice {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// One request to speak text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: Uuid,
    pub text: String,
    /// Explicit voice; `None` lets the platform choose
    pub voice_uri: Option<String>,
    /// Language hint; `None` uses the platform default
    pub lang: Option<String>,
}

/// Text-to-speech device
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently known to the device (may be empty while loading)
    fn voices(&self) -> Vec<PlatformVoice>;

    /// Queue an utterance for playback
    fn speak(&self, utterance: Utterance) -> Result<()>;

    /// Stop all playback immediately
    fn cancel(&self);
}

/// Settings applied to each recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep listening across utterances
    pub continuous: bool,
    /// Report partial results while the user is still speaking
    pub interim_results: bool,
    /// Recognition language tag
    pub language: String,
}

impl RecognitionOptions {
    /// Single utterance with interim results
    pub fn single_utterance(language: impl Into<String>) -> Self {
        Self {
            continuous: false,
            interim_results: true,
            language: language.into(),
        }
    }
}

/// Speech-to-text device
pub trait SpeechRecognizer: Send + Sync {
    /// Begin a recognition session
    fn start(&self, options: &RecognitionOptions) -> Result<()>;

    /// Ask the device to finish; it confirms with [`RecognitionEvent::End`]
    fn stop(&self);
}

/// One recognition result with its ranked alternatives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionResult {
    pub alternatives: Vec<String>,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: true,
        }
    }

    /// Top-ranked transcript, if any
    pub fn best(&self) -> Option<&str> {
        self.alternatives.first().map(String::as_str)
    }
}

/// Events raised by the recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Every result known so far in the current session
    Results(Vec<RecognitionResult>),
    /// Device error code, e.g. "no-speech" or "not-allowed"
    Error(String),
    /// The session ended (explicit stop, silence timeout, or after an error)
    End,
}

/// Any callback from the platform's devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Recognition(RecognitionEvent),
    /// The synthesizer's voice list changed
    VoicesChanged,
    /// An utterance finished playing
    PlaybackFinished(Uuid),
}

/// Which speech devices exist, probed once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub synthesis: bool,
    pub recognition: bool,
}

/// The speech devices available to a session
#[derive(Clone, Default)]
pub struct Platform {
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl Platform {
    /// No speech devices at all
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            synthesis: self.synthesizer.is_some(),
            recognition: self.recognizer.is_some(),
        }
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mute;

    impl SpeechSynthesizer for Mute {
        fn voices(&self) -> Vec<PlatformVoice> {
            Vec::new()
        }
        fn speak(&self, _utterance: Utterance) -> Result<()> {
            Ok(())
        }
        fn cancel(&self) {}
    }

    #[test]
    fn test_headless_has_no_capabilities() {
        let caps = Platform::headless().capabilities();
        assert!(!caps.synthesis);
        assert!(!caps.recognition);
    }

    #[test]
    fn test_capabilities_follow_devices() {
        let platform = Platform::headless().with_synthesizer(Arc::new(Mute));
        assert_eq!(
            platform.capabilities(),
            Capabilities {
                synthesis: true,
                recognition: false
            }
        );
    }

    #[test]
    fn test_single_utterance_options() {
        let options = RecognitionOptions::single_utterance("en-US");
        assert!(!options.continuous);
        assert!(options.interim_results);
        assert_eq!(options.language, "en-US");
    }
}
