//! Session coordinator: the conversation and the devices around it
//!
//! Owns the transcript, the input buffer and the in-flight flag, and
//! arbitrates between submitting, listening and speaking:
//!
//! - a submit silences playback and stops capture before the request goes out
//! - only one request is ever in flight; a second submit is rejected, not queued
//! - listening cannot start while a request is pending
//!
//! All operations take `&self` and never hold a lock across an `.await`,
//! so the session can be shared by the tasks of a single-threaded runtime.

use crate::integration::config::SessionConfig;
use crate::integration::notify::{Notification, NotificationSink};
use crate::llm::{GenerationClient, GenerationRequest, Tone};
use crate::messages::{Transcript, Turn};
use crate::speech::{
    Capabilities, CaptureController, CaptureSignal, Platform, PlatformEvent, RecognitionOptions,
    SpeechSynthesizer, StartOutcome, UtterancePlayer, VoiceCatalog, VoiceDescriptor, VoiceOption,
    VoiceSelection,
};
use crate::ChatError;
use crossbeam_channel::Receiver;
use futures::Stream;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Assistant turn appended when generation fails
pub const FALLBACK_REPLY: &str = "I seem to be having a bit of trouble connecting right now. Please try sending your message again shortly.";

const GENERATION_FAILED: &str = "Failed to get a response. Please try again.";
const RECOGNITION_UNSUPPORTED: &str = "Speech recognition is not supported on this platform.";
const MIC_ERROR_TITLE: &str = "Mic Error";

/// Why a submit did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    RequestPending,
    SessionClosed,
}

/// Result of a submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The service answered; the assistant turn that was appended
    Replied(Turn),
    /// The service failed; the fallback turn that was appended
    FellBack(Turn),
    Rejected(SubmitRejection),
}

impl SubmitOutcome {
    /// The assistant turn appended by this submit, if any
    pub fn reply(&self) -> Option<&Turn> {
        match self {
            SubmitOutcome::Replied(turn) | SubmitOutcome::FellBack(turn) => Some(turn),
            SubmitOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmitOutcome::Rejected(_))
    }
}

/// Result of toggling the microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    /// Listening resumes once the previous capture confirms its end
    Deferred,
    Stopped,
    /// No recognizer; an "unsupported" notice was shown
    Unsupported,
    /// A request is in flight
    Busy,
    /// The recognizer refused to start; a notice was shown
    Failed,
    SessionClosed,
}

/// Microphone indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MicrophoneStatus {
    Listening,
    Ready,
    Unsupported,
}

impl MicrophoneStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MicrophoneStatus::Listening => "Listening...",
            MicrophoneStatus::Ready => "Ready",
            MicrophoneStatus::Unsupported => "Not Supported",
        }
    }
}

/// Immutable view of the session for rendering
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub transcript: Vec<Turn>,
    pub input: String,
    pub pending_request: bool,
    pub listening: bool,
    pub voice_reply_enabled: bool,
    pub selected_voice: Option<String>,
    pub tone: Tone,
    pub capabilities: Capabilities,
}

#[derive(Debug)]
struct SessionState {
    transcript: Transcript,
    input: String,
    pending_request: bool,
    /// Weak reference by URI; re-resolved against the catalog at use
    selected_voice: Option<String>,
    tone: Tone,
    closed: bool,
}

/// Holds the in-flight flag; released on every exit path, including
/// when the submit future is dropped mid-request.
struct PendingGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().pending_request = false;
        debug!("Request no longer pending");
    }
}

pub struct ChatSession {
    state: Mutex<SessionState>,
    catalog: RwLock<VoiceCatalog>,
    player: UtterancePlayer,
    capture: CaptureController,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    capabilities: Capabilities,
    generator: Arc<dyn GenerationClient>,
    notifier: Arc<dyn NotificationSink>,
}

impl ChatSession {
    pub fn new(
        config: SessionConfig,
        platform: Platform,
        generator: Arc<dyn GenerationClient>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let capabilities = platform.capabilities();
        info!(
            "Opening chat session (synthesis: {}, recognition: {})",
            capabilities.synthesis, capabilities.recognition
        );

        let mut transcript = Transcript::new();
        if let Some(greeting) = &config.greeting {
            transcript.push(Turn::assistant(greeting.clone()));
        }

        let mut catalog = VoiceCatalog::new();
        if let Some(synthesizer) = &platform.synthesizer {
            catalog.refresh_from(synthesizer.as_ref());
        }

        let player = UtterancePlayer::new(
            platform.synthesizer.clone(),
            config.default_language_prefix.clone(),
            config.voice_reply_enabled,
        );
        let capture = CaptureController::new(
            platform.recognizer.clone(),
            RecognitionOptions::single_utterance(config.recognition_language.clone()),
        );

        Self {
            state: Mutex::new(SessionState {
                transcript,
                input: String::new(),
                pending_request: false,
                selected_voice: None,
                tone: config.default_tone,
                closed: false,
            }),
            catalog: RwLock::new(catalog),
            player,
            capture,
            synthesizer: platform.synthesizer,
            capabilities,
            generator,
            notifier,
        }
    }

    // === Turn taking ===

    /// Send `raw_text` to the generation service and append both turns.
    ///
    /// Playback is silenced and capture stopped before the request goes
    /// out, so no audio or microphone state straddles two turns.
    pub async fn submit(&self, raw_text: &str) -> SubmitOutcome {
        let prompt = raw_text.trim();
        if prompt.is_empty() {
            debug!("Ignoring empty submit");
            return SubmitOutcome::Rejected(SubmitRejection::EmptyInput);
        }

        let _pending = match self.begin_request() {
            Ok(guard) => guard,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        self.player.cancel_all();
        if self.capture.is_active() {
            self.capture.stop();
        }

        let tone = {
            let mut state = self.state.lock();
            state.transcript.push(Turn::user(prompt));
            state.input.clear();
            state.tone
        };

        info!("Submitting prompt ({} chars, tone: {})", prompt.len(), tone);
        let result = self
            .generator
            .generate(GenerationRequest::new(prompt, Some(tone)))
            .await;

        let (turn, failed) = match result {
            Ok(response) => {
                debug!("Generation returned {} chars", response.text.len());
                (Turn::assistant(response.text), false)
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                self.notifier
                    .notify(Notification::error("Error", GENERATION_FAILED));
                (Turn::assistant(FALLBACK_REPLY), true)
            }
        };

        let (selected_voice, closed) = {
            let mut state = self.state.lock();
            state.transcript.push(turn.clone());
            (state.selected_voice.clone(), state.closed)
        };

        if !closed {
            self.speak(turn.text(), selected_voice.as_deref());
        }

        if failed {
            SubmitOutcome::FellBack(turn)
        } else {
            SubmitOutcome::Replied(turn)
        }
    }

    /// Submit whatever is in the input buffer
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit(&text).await
    }

    /// Start or stop listening
    pub fn toggle_listening(&self) -> ToggleOutcome {
        if !self.capture.is_supported() {
            self.notifier
                .notify(Notification::error("Unsupported", RECOGNITION_UNSUPPORTED));
            return ToggleOutcome::Unsupported;
        }

        if self.capture.is_active() {
            self.capture.stop();
            return ToggleOutcome::Stopped;
        }

        {
            let mut state = self.state.lock();
            if state.closed {
                return ToggleOutcome::SessionClosed;
            }
            if state.pending_request {
                debug!("Refusing to listen while a request is pending");
                return ToggleOutcome::Busy;
            }
            state.input.clear();
        }

        match self.capture.start() {
            Ok(StartOutcome::Started) | Ok(StartOutcome::AlreadyListening) => {
                ToggleOutcome::Started
            }
            Ok(StartOutcome::Deferred) => ToggleOutcome::Deferred,
            Err(e) => {
                warn!("Failed to start capture: {}", e);
                self.notifier
                    .notify(Notification::error(MIC_ERROR_TITLE, e.user_message()));
                ToggleOutcome::Failed
            }
        }
    }

    // === Device callbacks ===

    /// Apply one callback from the platform's devices
    pub fn handle_event(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::Recognition(event) => {
                let signal = self.capture.handle_event(event);
                self.handle_capture_signal(signal);
            }
            PlatformEvent::VoicesChanged => {
                self.refresh_voices();
            }
            PlatformEvent::PlaybackFinished(id) => self.player.on_finished(id),
        }
    }

    /// Drain pending device callbacks, returning how many were applied
    pub fn poll_events(&self, rx: &Receiver<PlatformEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    fn handle_capture_signal(&self, signal: CaptureSignal) {
        match signal {
            CaptureSignal::Transcript(text) => {
                self.state.lock().input = text;
            }
            CaptureSignal::Failed(kind) => {
                self.notifier
                    .notify(Notification::error(MIC_ERROR_TITLE, kind.description()));
            }
            CaptureSignal::RestartFailed(reason) => {
                let err = ChatError::Capture(reason);
                self.notifier
                    .notify(Notification::error(MIC_ERROR_TITLE, err.user_message()));
            }
            CaptureSignal::Ended | CaptureSignal::Restarted | CaptureSignal::Ignored => {}
        }
    }

    /// Re-query the synthesizer's voice list
    pub fn refresh_voices(&self) -> bool {
        match &self.synthesizer {
            Some(synthesizer) => self.catalog.write().refresh_from(synthesizer.as_ref()),
            None => false,
        }
    }

    // === Configuration ===

    pub fn set_tone(&self, tone: Tone) {
        debug!("Tone set to {}", tone);
        self.state.lock().tone = tone;
    }

    /// Turning voice reply off also silences anything playing now
    pub fn set_voice_reply_enabled(&self, enabled: bool) {
        info!("Voice reply {}", if enabled { "enabled" } else { "disabled" });
        self.player.set_enabled(enabled);
    }

    /// Select a voice by URI, or `None` for the platform default
    pub fn set_selected_voice(&self, uri: Option<String>) {
        debug!("Selected voice: {:?}", uri);
        self.state.lock().selected_voice = uri;
    }

    pub fn select_voice(&self, selection: VoiceSelection) {
        match selection {
            VoiceSelection::PlatformDefault => self.set_selected_voice(None),
            VoiceSelection::Voice(uri) => self.set_selected_voice(Some(uri)),
        }
    }

    /// Replace the input buffer. Refused while a request is pending or
    /// while listening, when capture owns the buffer.
    pub fn set_input(&self, text: impl Into<String>) -> bool {
        if self.capture.is_active() {
            return false;
        }
        let mut state = self.state.lock();
        if state.pending_request || state.closed {
            return false;
        }
        state.input = text.into();
        true
    }

    // === Teardown ===

    /// Release both devices. Idempotent; also runs on drop.
    pub fn teardown(&self) {
        let first = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };

        self.player.cancel_all();
        self.capture.stop();

        if first {
            info!("Chat session closed");
        }
    }

    // === Queries ===

    pub fn transcript(&self) -> Vec<Turn> {
        self.state.lock().transcript.turns().to_vec()
    }

    pub fn input(&self) -> String {
        self.state.lock().input.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending_request
    }

    pub fn is_listening(&self) -> bool {
        self.capture.is_active()
    }

    pub fn is_speaking(&self) -> bool {
        self.player.is_speaking()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn voice_reply_enabled(&self) -> bool {
        self.player.is_enabled()
    }

    pub fn selected_voice(&self) -> Option<String> {
        self.state.lock().selected_voice.clone()
    }

    pub fn tone(&self) -> Tone {
        self.state.lock().tone
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.read().voices().to_vec()
    }

    pub fn voice_options(&self) -> Vec<VoiceOption> {
        self.catalog.read().options()
    }

    pub fn microphone_status(&self) -> MicrophoneStatus {
        if !self.capture.is_supported() {
            MicrophoneStatus::Unsupported
        } else if self.capture.is_active() {
            MicrophoneStatus::Listening
        } else {
            MicrophoneStatus::Ready
        }
    }

    /// Live transcripts of the next recognition session
    pub fn live_transcripts(&self) -> impl Stream<Item = String> {
        self.capture.transcripts()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let listening = self.is_listening();
        let voice_reply_enabled = self.voice_reply_enabled();
        let state = self.state.lock();
        SessionSnapshot {
            transcript: state.transcript.turns().to_vec(),
            input: state.input.clone(),
            pending_request: state.pending_request,
            listening,
            voice_reply_enabled,
            selected_voice: state.selected_voice.clone(),
            tone: state.tone,
            capabilities: self.capabilities,
        }
    }

    // === Internals ===

    /// Check the preconditions and take the in-flight flag in one step
    fn begin_request(&self) -> Result<PendingGuard<'_>, SubmitRejection> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SubmitRejection::SessionClosed);
        }
        if state.pending_request {
            debug!("Rejecting submit: a request is already pending");
            return Err(SubmitRejection::RequestPending);
        }
        state.pending_request = true;
        Ok(PendingGuard { state: &self.state })
    }

    fn speak(&self, text: &str, selected_voice: Option<&str>) {
        let catalog = self.catalog.read();
        self.player.speak(text, &catalog, selected_voice);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("capabilities", &self.capabilities)
            .field("pending", &self.is_pending())
            .field("listening", &self.is_listening())
            .finish()
    }
}
