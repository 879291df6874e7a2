//! Utterance player: spoken replies with at most one active utterance

use crate::speech::catalog::VoiceCatalog;
use crate::speech::platform::{SpeechSynthesizer, Utterance};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How an utterance's voice and language were chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceChoice {
    /// The selected voice, with its language tag
    Selected { uri: String, lang: String },
    /// Language of the first voice matching the default prefix
    DefaultLanguage { lang: String },
    /// Language of the first voice in the catalog
    FirstAvailable { lang: String },
    /// Nothing known; the platform decides
    PlatformDefault,
}

impl VoiceChoice {
    fn voice_uri(&self) -> Option<String> {
        match self {
            VoiceChoice::Selected { uri, .. } => Some(uri.clone()),
            _ => None,
        }
    }

    fn lang(&self) -> Option<String> {
        match self {
            VoiceChoice::Selected { lang, .. }
            | VoiceChoice::DefaultLanguage { lang }
            | VoiceChoice::FirstAvailable { lang } => Some(lang.clone()),
            VoiceChoice::PlatformDefault => None,
        }
    }
}

/// Resolve the voice for an utterance against the catalog as it is now.
///
/// A selected URI that is no longer in the catalog falls through to the
/// language fallbacks.
pub fn resolve_voice(
    catalog: &VoiceCatalog,
    selected_uri: Option<&str>,
    default_language_prefix: &str,
) -> VoiceChoice {
    if let Some(voice) = selected_uri.and_then(|uri| catalog.find(uri)) {
        return VoiceChoice::Selected {
            uri: voice.uri.clone(),
            lang: voice.language_tag.clone(),
        };
    }

    if let Some(voice) = catalog.first_with_language_prefix(default_language_prefix) {
        return VoiceChoice::DefaultLanguage {
            lang: voice.language_tag.clone(),
        };
    }

    match catalog.voices().first() {
        Some(voice) => VoiceChoice::FirstAvailable {
            lang: voice.language_tag.clone(),
        },
        None => VoiceChoice::PlatformDefault,
    }
}

pub struct UtterancePlayer {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    default_language_prefix: String,
    enabled: AtomicBool,
    current: Mutex<Option<Uuid>>,
}

impl UtterancePlayer {
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        default_language_prefix: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            synthesizer,
            default_language_prefix: default_language_prefix.into(),
            enabled: AtomicBool::new(enabled),
            current: Mutex::new(None),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synthesizer.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn spoken replies on or off; turning them off silences playback now
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.cancel_all();
        }
    }

    /// Whether an utterance has started and not yet finished
    pub fn is_speaking(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn current(&self) -> Option<Uuid> {
        *self.current.lock()
    }

    /// Speak `text`, replacing whatever is playing.
    ///
    /// Returns the id of the new utterance, or `None` when nothing was
    /// started (voice reply off, no synthesizer, empty text, device error).
    pub fn speak(
        &self,
        text: &str,
        catalog: &VoiceCatalog,
        selected_uri: Option<&str>,
    ) -> Option<Uuid> {
        if !self.is_enabled() {
            return None;
        }
        let synthesizer = self.synthesizer.as_ref()?;

        self.stop(synthesizer.as_ref());

        if text.trim().is_empty() {
            return None;
        }

        let choice = resolve_voice(catalog, selected_uri, &self.default_language_prefix);
        let utterance = Utterance {
            id: Uuid::new_v4(),
            text: text.to_string(),
            voice_uri: choice.voice_uri(),
            lang: choice.lang(),
        };
        let id = utterance.id;

        debug!("Speaking {} chars with {:?}", text.len(), choice);
        // The platform may report completion before `speak` returns
        *self.current.lock() = Some(id);
        match synthesizer.speak(utterance) {
            Ok(()) => Some(id),
            Err(e) => {
                warn!("Speech synthesis failed: {}", e);
                let mut current = self.current.lock();
                if *current == Some(id) {
                    *current = None;
                }
                None
            }
        }
    }

    /// Stop playback unconditionally
    pub fn cancel_all(&self) {
        if let Some(synthesizer) = &self.synthesizer {
            self.stop(synthesizer.as_ref());
        }
    }

    /// The platform finished playing `id`; stale ids are ignored
    pub fn on_finished(&self, id: Uuid) {
        let mut current = self.current.lock();
        if *current == Some(id) {
            *current = None;
            debug!("Utterance {} finished", id);
        }
    }

    fn stop(&self, synthesizer: &dyn SpeechSynthesizer) {
        synthesizer.cancel();
        if let Some(id) = self.current.lock().take() {
            info!("Cancelled utterance {}", id);
        }
    }
}
