//! Text generation for assistant replies
//!
//! - **tone**: the enumerated tone setting passed along with every prompt
//! - **prompts**: template rendering for the templated generation service
//! - **client**: the `GenerationClient` boundary and its templated implementation

pub mod client;
pub mod prompts;
pub mod tone;

pub use client::{
    CompletionBackend, DryRunBackend, GenerationClient, GenerationRequest, GenerationResponse,
    TemplatedClient,
};
pub use prompts::{render_prompt, validate_template, DEFAULT_TEMPLATE};
pub use tone::Tone;
