//! Voice catalog: the deduplicated, labeled list of synthesis voices
//!
//! The platform may announce voice-list changes any number of times after
//! startup, so `refresh` is idempotent and ignores an empty list (voices
//! not loaded yet).

use crate::speech::platform::{PlatformVoice, SpeechSynthesizer};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Label of the synthetic entry meaning "let the platform choose"
pub const DEFAULT_VOICE_LABEL: &str = "Default (platform)";

/// Language families that get numbered labels, keyed by two-letter prefix
const LABELED_FAMILIES: [(&str, &str); 4] = [
    ("en", "English"),
    ("hi", "Hindi"),
    ("es", "Spanish"),
    ("zh", "Chinese"),
];

/// A selectable synthesis voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    pub uri: String,
    pub display_name: String,
    pub language_tag: String,
}

/// What a voice option selects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "uri", rename_all = "snake_case")]
pub enum VoiceSelection {
    PlatformDefault,
    Voice(String),
}

/// One entry of the voice picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceOption {
    pub selection: VoiceSelection,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<VoiceDescriptor>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-query the synthesizer's current voice list
    pub fn refresh_from(&mut self, synthesizer: &dyn SpeechSynthesizer) -> bool {
        self.refresh(&synthesizer.voices())
    }

    /// Rebuild the catalog from a platform voice list.
    ///
    /// Returns `false` (and changes nothing) when the list is empty.
    pub fn refresh(&mut self, platform_voices: &[PlatformVoice]) -> bool {
        if platform_voices.is_empty() {
            debug!("Voice list empty, keeping {} known voices", self.voices.len());
            return false;
        }

        let mut seen = HashSet::new();
        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut voices = Vec::with_capacity(platform_voices.len());

        for voice in platform_voices {
            if !seen.insert(voice.uri.as_str()) {
                continue;
            }

            let prefix = language_prefix(&voice.lang);
            let display_name = match LABELED_FAMILIES.iter().find(|(p, _)| *p == prefix) {
                Some((family_prefix, family)) => {
                    let n = counters.entry(*family_prefix).or_insert(0);
                    *n += 1;
                    format!("{} Voice {}", family, n)
                }
                None => format!("{} ({})", voice.name, voice.lang),
            };

            voices.push(VoiceDescriptor {
                uri: voice.uri.clone(),
                display_name,
                language_tag: voice.lang.clone(),
            });
        }

        debug!(
            "Voice catalog refreshed: {} voices ({} reported)",
            voices.len(),
            platform_voices.len()
        );
        self.voices = voices;
        true
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Look up a voice by URI; a voice that has since disappeared is `None`
    pub fn find(&self, uri: &str) -> Option<&VoiceDescriptor> {
        self.voices.iter().find(|v| v.uri == uri)
    }

    /// First voice whose language tag starts with `prefix`
    pub fn first_with_language_prefix(&self, prefix: &str) -> Option<&VoiceDescriptor> {
        self.voices
            .iter()
            .find(|v| v.language_tag.starts_with(prefix))
    }

    /// Picker entries: the platform default first, then every voice
    pub fn options(&self) -> Vec<VoiceOption> {
        std::iter::once(VoiceOption {
            selection: VoiceSelection::PlatformDefault,
            label: DEFAULT_VOICE_LABEL.to_string(),
        })
        .chain(self.voices.iter().map(|v| VoiceOption {
            selection: VoiceSelection::Voice(v.uri.clone()),
            label: v.display_name.clone(),
        }))
        .collect()
    }
}

/// First two characters of a language tag, lower-cased
fn language_prefix(tag: &str) -> String {
    tag.chars().take(2).collect::<String>().to_lowercase()
}
