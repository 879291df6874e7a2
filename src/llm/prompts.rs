//! Prompt templates for the generation service

use crate::llm::tone::Tone;
use crate::{ChatError, Result};

/// Placeholder replaced with the user's prompt
pub const PROMPT_SLOT: &str = "{{prompt}}";

/// Placeholder replaced with the tone wire value
pub const TONE_SLOT: &str = "{{tone}}";

/// Opening marker of a section rendered only when a tone is given
pub const TONE_SECTION_OPEN: &str = "{{#tone}}";

/// Closing marker of the tone section
pub const TONE_SECTION_CLOSE: &str = "{{/tone}}";

/// Default template used when the configuration does not supply one
pub const DEFAULT_TEMPLATE: &str = r#"You are taking part in a job interview. Answer the interviewer's question as yourself: be honest, personable and authentic, and keep the answer conversational because it may be read aloud.

Interviewer's question: {{prompt}}
{{#tone}}
Your response should be in a {{tone}} tone.
{{/tone}}"#;

/// Render `template` for one request.
///
/// The tone section is kept (with its markers stripped) when `tone` is
/// present and removed entirely otherwise.
pub fn render_prompt(template: &str, prompt: &str, tone: Option<Tone>) -> String {
    let mut rendered = String::with_capacity(template.len() + prompt.len());
    let mut rest = template;

    while let Some(open) = rest.find(TONE_SECTION_OPEN) {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + TONE_SECTION_OPEN.len()..];

        let Some(close) = after_open.find(TONE_SECTION_CLOSE) else {
            // Unterminated section: treat the marker as literal text
            rendered.push_str(&rest[open..]);
            rest = "";
            break;
        };

        if tone.is_some() {
            rendered.push_str(after_open[..close].trim_start_matches('\n'));
        }
        rest = after_open[close + TONE_SECTION_CLOSE.len()..].trim_start_matches('\n');
    }
    rendered.push_str(rest);

    let tone_value = tone.map(|t| t.as_str()).unwrap_or_default();
    rendered
        .replace(TONE_SLOT, tone_value)
        .replace(PROMPT_SLOT, prompt)
        .trim_end()
        .to_string()
}

/// Check that a custom template can carry the user's prompt
pub fn validate_template(template: &str) -> Result<()> {
    if !template.contains(PROMPT_SLOT) {
        return Err(ChatError::Config(format!(
            "Prompt template must contain {}",
            PROMPT_SLOT
        )));
    }

    let opens = template.matches(TONE_SECTION_OPEN).count();
    let closes = template.matches(TONE_SECTION_CLOSE).count();
    if opens != closes {
        return Err(ChatError::Config(
            "Prompt template has an unbalanced tone section".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_is_valid() {
        assert!(validate_template(DEFAULT_TEMPLATE).is_ok());
    }

    #[test]
    fn test_render_with_tone() {
        let rendered = render_prompt(DEFAULT_TEMPLATE, "What are your skills?", Some(Tone::Casual));
        assert!(rendered.contains("Interviewer's question: What are your skills?"));
        assert!(rendered.ends_with("Your response should be in a casual tone."));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_render_without_tone_drops_section() {
        let rendered = render_prompt(DEFAULT_TEMPLATE, "Tell me about yourself", None);
        assert!(rendered.ends_with("Interviewer's question: Tell me about yourself"));
        assert!(!rendered.contains("tone"));
    }

    #[test]
    fn test_tone_slot_outside_section() {
        let rendered = render_prompt("[{{tone}}] {{prompt}}", "hi", Some(Tone::Sincere));
        assert_eq!(rendered, "[sincere] hi");
    }

    #[test]
    fn test_unterminated_section_is_literal() {
        let rendered = render_prompt("{{prompt}} {{#tone}}oops", "hi", Some(Tone::Neutral));
        assert_eq!(rendered, "hi {{#tone}}oops");
    }

    #[test]
    fn test_validate_rejects_missing_prompt_slot() {
        assert!(validate_template("Answer in a {{tone}} tone").is_err());
        assert!(validate_template("{{prompt}} {{#tone}}x").is_err());
        assert!(validate_template("{{prompt}}").is_ok());
    }
}
