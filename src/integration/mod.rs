//! Session layer: the coordinator and what surrounds it
//!
//! - **config**: session configuration (TOML file, builder overrides)
//! - **notify**: user-visible notifications and the sink they go to
//! - **session**: the coordinator tying transcript, generation and devices together

pub mod config;
pub mod notify;
pub mod session;

pub use config::{SessionConfig, DEFAULT_GREETING};
pub use notify::{notification_channel, ChannelNotifier, Notification, NotificationSink, Severity};
pub use session::{
    ChatSession, MicrophoneStatus, SessionSnapshot, SubmitOutcome, SubmitRejection,
    ToggleOutcome, FALLBACK_REPLY,
};
