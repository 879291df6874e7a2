use crate::ChatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stylistic parameter forwarded to the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    #[default]
    Professional,
    Casual,
    Enthusiastic,
    Sincere,
    Thoughtful,
    Reflective,
}

impl Tone {
    pub const ALL: [Tone; 7] = [
        Tone::Neutral,
        Tone::Professional,
        Tone::Casual,
        Tone::Enthusiastic,
        Tone::Sincere,
        Tone::Thoughtful,
        Tone::Reflective,
    ];

    /// Wire value sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Enthusiastic => "enthusiastic",
            Tone::Sincere => "sincere",
            Tone::Thoughtful => "thoughtful",
            Tone::Reflective => "reflective",
        }
    }

    /// Human-readable label for selection lists
    pub fn label(&self) -> &'static str {
        match self {
            Tone::Neutral => "Neutral",
            Tone::Professional => "Professional",
            Tone::Casual => "Casual",
            Tone::Enthusiastic => "Enthusiastic",
            Tone::Sincere => "Sincere",
            Tone::Thoughtful => "Thoughtful",
            Tone::Reflective => "Reflective",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Tone::ALL
            .iter()
            .copied()
            .find(|tone| tone.as_str() == wanted)
            .ok_or_else(|| ChatError::Config(format!("Unknown tone: {}", s)))
    }
}
