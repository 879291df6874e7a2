//! Speech devices and their session-facing wrappers
//!
//! This module provides:
//! - Capability contracts for the platform's synthesizer and recognizer
//! - The voice catalog (deduplicated, labeled voices)
//! - The utterance player (spoken replies, one at a time)
//! - The capture controller (single-utterance recognition)

pub mod capture;
pub mod catalog;
pub mod platform;
pub mod player;

// Re-export commonly used types
pub use capture::{CaptureController, CaptureErrorKind, CapturePhase, CaptureSignal, StartOutcome};
pub use catalog::{VoiceCatalog, VoiceDescriptor, VoiceOption, VoiceSelection, DEFAULT_VOICE_LABEL};
pub use platform::{
    Capabilities, Platform, PlatformEvent, PlatformVoice, RecognitionEvent, RecognitionOptions,
    RecognitionResult, SpeechRecognizer, SpeechSynthesizer, Utterance,
};
pub use player::{resolve_voice, UtterancePlayer, VoiceChoice};
