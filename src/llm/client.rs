//! Request/response boundary to the templated generation service
//!
//! The session only ever sees [`GenerationClient`]: one prompt in, one
//! text out, or a single opaque failure. No streaming, no retries.

use crate::llm::prompts::{render_prompt, validate_template, DEFAULT_TEMPLATE};
use crate::llm::tone::Tone;
use crate::{ChatError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Input to the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's prompt (never empty once validated)
    pub prompt: String,

    /// Tone preference; `None` means no preference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, tone: Option<Tone>) -> Self {
        Self {
            prompt: prompt.into(),
            tone,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(ChatError::Generation("Prompt must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Output of the generation service. `text` may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
}

impl GenerationResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Stateless adapter to whatever produces assistant replies
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}

/// Raw completion endpoint behind a [`TemplatedClient`]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, rendered_prompt: &str) -> Result<String>;
}

/// Generation client that renders a prompt template before completion
pub struct TemplatedClient<B> {
    template: String,
    backend: B,
}

impl<B: CompletionBackend> TemplatedClient<B> {
    /// Create a client using the built-in template
    pub fn new(backend: B) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            backend,
        }
    }

    /// Create a client with a custom template
    pub fn with_template(template: impl Into<String>, backend: B) -> Result<Self> {
        let template = template.into();
        validate_template(&template)?;
        Ok(Self { template, backend })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: CompletionBackend> GenerationClient for TemplatedClient<B> {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        request.validate()?;

        let rendered = render_prompt(&self.template, request.prompt.trim(), request.tone);
        debug!(
            "Rendered prompt ({} chars, tone: {:?})",
            rendered.len(),
            request.tone
        );

        match self.backend.complete(&rendered).await {
            Ok(text) => Ok(GenerationResponse::new(text)),
            Err(e) => {
                warn!("Completion backend failed: {}", e);
                // Callers only need to know that generation failed
                Err(ChatError::Generation(e.to_string()))
            }
        }
    }
}

/// Backend that answers with the rendered prompt itself.
///
/// Lets the terminal front-end run without a service, showing exactly
/// what would have been sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBackend;

#[async_trait]
impl CompletionBackend for DryRunBackend {
    async fn complete(&self, rendered_prompt: &str) -> Result<String> {
        Ok(rendered_prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(&self, rendered_prompt: &str) -> Result<String> {
            self.seen.lock().push(rendered_prompt.to_string());
            if self.fail {
                Err(ChatError::Io("connection reset".to_string()))
            } else {
                Ok("I enjoy building things.".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_generate_renders_template() {
        let client =
            TemplatedClient::with_template("Q: {{prompt}} ({{tone}})", RecordingBackend::default())
                .unwrap();

        let response = client
            .generate(GenerationRequest::new("  Why Rust?  ", Some(Tone::Thoughtful)))
            .await
            .unwrap();

        assert_eq!(response.text, "I enjoy building things.");
        assert_eq!(
            client.backend().seen.lock().as_slice(),
            ["Q: Why Rust? (thoughtful)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_never_reaches_backend() {
        let client = TemplatedClient::new(RecordingBackend::default());
        let result = client.generate(GenerationRequest::new("   ", None)).await;

        assert!(matches!(result, Err(ChatError::Generation(_))));
        assert!(client.backend().seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_opaque_generation_error() {
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let client = TemplatedClient::new(backend);
        let result = client.generate(GenerationRequest::new("hello", None)).await;

        assert!(matches!(result, Err(ChatError::Generation(_))));
    }

    #[test]
    fn test_custom_template_must_carry_prompt() {
        assert!(TemplatedClient::with_template("no slot", DryRunBackend).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_echoes_rendered_prompt() {
        let client = TemplatedClient::with_template("> {{prompt}}", DryRunBackend).unwrap();
        let response = client
            .generate(GenerationRequest::new("ping", None))
            .await
            .unwrap();
        assert_eq!(response.text, "> ping");
    }

    #[test]
    fn test_request_omits_missing_tone() {
        let json = serde_json::to_value(GenerationRequest::new("hi", None)).unwrap();
        assert!(json.get("tone").is_none());
    }
}
