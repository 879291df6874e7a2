//! Capture controller: single-utterance speech recognition
//!
//! The controller owns the recognition session lifecycle:
//!
//! ```text
//! Idle --start--> Listening --stop--> Stopping --End--> Idle
//!                     |                                  ^
//!                     +---------- End / Error -----------+
//! ```
//!
//! `stop` is only a request; the device confirms with `End`. A `start`
//! issued while `Stopping` is deferred until that confirmation arrives.

use crate::speech::platform::{
    RecognitionEvent, RecognitionOptions, RecognitionResult, SpeechRecognizer,
};
use crate::{ChatError, Result};
use futures::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Recognition session phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapturePhase {
    #[default]
    Idle,
    Listening,
    /// Stop requested, waiting for the device to confirm
    Stopping,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePhase::Idle => write!(f, "Idle"),
            CapturePhase::Listening => write!(f, "Listening"),
            CapturePhase::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Classified recognition failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    NoSpeech,
    AudioCapture,
    NotAllowed,
    Network,
    Other(String),
}

impl CaptureErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => CaptureErrorKind::NoSpeech,
            "audio-capture" => CaptureErrorKind::AudioCapture,
            "not-allowed" => CaptureErrorKind::NotAllowed,
            "network" => CaptureErrorKind::Network,
            other => CaptureErrorKind::Other(other.to_string()),
        }
    }

    /// Message shown to the user
    pub fn description(&self) -> &'static str {
        match self {
            CaptureErrorKind::NoSpeech => "No speech was detected. Please try again.",
            CaptureErrorKind::AudioCapture => {
                "Microphone problem. Please ensure it is enabled and working."
            }
            CaptureErrorKind::NotAllowed => {
                "Microphone access denied. Please enable it in your system settings."
            }
            CaptureErrorKind::Network => {
                "Network error during speech recognition. Please check your internet connection."
            }
            CaptureErrorKind::Other(_) => "Speech recognition error.",
        }
    }
}

/// Result of asking the controller to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Previous session still stopping; starts on its `End`
    Deferred,
    AlreadyListening,
}

/// What a device event meant for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSignal {
    /// New running transcript for the current utterance
    Transcript(String),
    /// The session ended and the controller is idle
    Ended,
    /// The session failed and the controller is idle
    Failed(CaptureErrorKind),
    /// A deferred start went through after the previous session ended
    Restarted,
    /// A deferred start was attempted and the device refused it
    RestartFailed(String),
    /// Nothing to do (stale or duplicate event)
    Ignored,
}

#[derive(Debug, Clone)]
enum CaptureUpdate {
    Transcript(String),
    Ended,
}

#[derive(Debug, Default)]
struct CaptureState {
    phase: CapturePhase,
    restart_pending: bool,
    transcript: String,
    sessions: u64,
}

pub struct CaptureController {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    options: RecognitionOptions,
    state: Mutex<CaptureState>,
    updates: broadcast::Sender<CaptureUpdate>,
}

impl CaptureController {
    pub fn new(recognizer: Option<Arc<dyn SpeechRecognizer>>, options: RecognitionOptions) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            recognizer,
            options,
            state: Mutex::new(CaptureState::default()),
            updates,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn phase(&self) -> CapturePhase {
        self.state.lock().phase
    }

    /// Listening, or about to listen once the previous session ends
    pub fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.phase == CapturePhase::Listening || state.restart_pending
    }

    /// Running transcript of the current (or last) utterance
    pub fn transcript(&self) -> String {
        self.state.lock().transcript.clone()
    }

    /// Number of recognition sessions started so far
    pub fn sessions(&self) -> u64 {
        self.state.lock().sessions
    }

    pub fn start(&self) -> Result<StartOutcome> {
        let recognizer = self
            .recognizer
            .as_ref()
            .ok_or_else(|| ChatError::Capture("Speech recognition is not supported".to_string()))?;

        let mut state = self.state.lock();
        match state.phase {
            CapturePhase::Listening => Ok(StartOutcome::AlreadyListening),
            CapturePhase::Stopping => {
                debug!("Capture still stopping, deferring start");
                state.restart_pending = true;
                Ok(StartOutcome::Deferred)
            }
            CapturePhase::Idle => {
                recognizer.start(&self.options)?;
                Self::begin_session(&mut state);
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Request the current session to stop. Safe to call in any phase.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.restart_pending = false;

        if state.phase == CapturePhase::Listening {
            if let Some(recognizer) = &self.recognizer {
                recognizer.stop();
            }
            state.phase = CapturePhase::Stopping;
            info!("Capture stop requested");
        }
    }

    /// Apply a device event
    pub fn handle_event(&self, event: RecognitionEvent) -> CaptureSignal {
        let mut state = self.state.lock();

        match event {
            RecognitionEvent::Results(results) => {
                if state.phase != CapturePhase::Listening {
                    debug!("Dropping results received while {}", state.phase);
                    return CaptureSignal::Ignored;
                }
                let transcript = concatenate_transcripts(&results);
                state.transcript.clone_from(&transcript);
                let _ = self.updates.send(CaptureUpdate::Transcript(transcript.clone()));
                CaptureSignal::Transcript(transcript)
            }
            RecognitionEvent::Error(code) => {
                let kind = CaptureErrorKind::from_code(&code);
                if state.phase == CapturePhase::Idle {
                    debug!("Ignoring recognition error '{}' while idle", code);
                    return CaptureSignal::Ignored;
                }
                warn!("Speech recognition error: {}", code);
                state.phase = CapturePhase::Idle;
                state.restart_pending = false;
                let _ = self.updates.send(CaptureUpdate::Ended);
                CaptureSignal::Failed(kind)
            }
            RecognitionEvent::End => match state.phase {
                CapturePhase::Idle => CaptureSignal::Ignored,
                CapturePhase::Listening => {
                    info!("Capture ended by device");
                    state.phase = CapturePhase::Idle;
                    let _ = self.updates.send(CaptureUpdate::Ended);
                    CaptureSignal::Ended
                }
                CapturePhase::Stopping => {
                    state.phase = CapturePhase::Idle;
                    let _ = self.updates.send(CaptureUpdate::Ended);

                    if !std::mem::take(&mut state.restart_pending) {
                        debug!("Capture stop confirmed");
                        return CaptureSignal::Ended;
                    }

                    let Some(recognizer) = &self.recognizer else {
                        return CaptureSignal::Ended;
                    };
                    match recognizer.start(&self.options) {
                        Ok(()) => {
                            Self::begin_session(&mut state);
                            CaptureSignal::Restarted
                        }
                        Err(e) => {
                            warn!("Deferred capture start failed: {}", e);
                            CaptureSignal::RestartFailed(e.to_string())
                        }
                    }
                }
            },
        }
    }

    /// Live transcripts of the next (or current) recognition session.
    ///
    /// The stream ends when that session ends; call again after the next
    /// `start` for a fresh one.
    pub fn transcripts(&self) -> impl Stream<Item = String> {
        let mut rx = self.updates.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(CaptureUpdate::Transcript(text)) => {
                        yield text;
                    }
                    Ok(CaptureUpdate::Ended) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Transcript stream lagged by {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    fn begin_session(state: &mut CaptureState) {
        state.phase = CapturePhase::Listening;
        state.restart_pending = false;
        state.transcript.clear();
        state.sessions += 1;
        info!("Capture started (session {})", state.sessions);
    }
}

/// Join the top alternative of every result into one running string
pub fn concatenate_transcripts(results: &[RecognitionResult]) -> String {
    results.iter().filter_map(RecognitionResult::best).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Mic {
        calls: Mutex<Vec<&'static str>>,
        refuse: AtomicBool,
    }

    impl SpeechRecognizer for Mic {
        fn start(&self, _options: &RecognitionOptions) -> Result<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ChatError::Capture("busy".to_string()));
            }
            self.calls.lock().push("start");
            Ok(())
        }

        fn stop(&self) {
            self.calls.lock().push("stop");
        }
    }

    fn controller(mic: &Arc<Mic>) -> CaptureController {
        CaptureController::new(
            Some(mic.clone()),
            RecognitionOptions::single_utterance("en-US"),
        )
    }

    #[test]
    fn test_concatenates_top_alternatives() {
        let results = vec![
            RecognitionResult {
                alternatives: vec!["hello ".into(), "yellow ".into()],
                is_final: true,
            },
            RecognitionResult::interim("world"),
            RecognitionResult::default(),
        ];
        assert_eq!(concatenate_transcripts(&results), "hello world");
    }

    #[test]
    fn test_error_codes_map_to_distinct_messages() {
        let kinds = ["no-speech", "audio-capture", "not-allowed", "network", "aborted"]
            .map(CaptureErrorKind::from_code);
        let mut messages: Vec<&str> = kinds.iter().map(|k| k.description()).collect();
        assert_eq!(kinds[4], CaptureErrorKind::Other("aborted".to_string()));
        assert_eq!(messages[4], "Speech recognition error.");
        messages.dedup();
        assert_eq!(messages.len(), 5);
    }

    #[test]
    fn test_start_requires_recognizer() {
        let capture = CaptureController::new(None, RecognitionOptions::single_utterance("en-US"));
        assert!(!capture.is_supported());
        assert!(capture.start().is_err());
    }

    #[test]
    fn test_device_end_returns_to_idle() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);

        assert_eq!(capture.start().unwrap(), StartOutcome::Started);
        assert!(capture.is_active());

        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Ended);
        assert_eq!(capture.phase(), CapturePhase::Idle);
        // A duplicate end is harmless
        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Ignored);
    }

    #[test]
    fn test_stop_waits_for_device_confirmation() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();

        capture.stop();
        assert_eq!(capture.phase(), CapturePhase::Stopping);
        assert!(!capture.is_active());

        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Ended);
        assert_eq!(capture.phase(), CapturePhase::Idle);
        assert_eq!(mic.calls.lock().as_slice(), ["start", "stop"]);
    }

    #[test]
    fn test_start_while_stopping_is_deferred_until_end() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();
        capture.stop();

        assert_eq!(capture.start().unwrap(), StartOutcome::Deferred);
        assert!(capture.is_active());
        assert_eq!(mic.calls.lock().len(), 2);

        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Restarted);
        assert_eq!(capture.phase(), CapturePhase::Listening);
        assert_eq!(capture.sessions(), 2);
        assert_eq!(mic.calls.lock().as_slice(), ["start", "stop", "start"]);
    }

    #[test]
    fn test_stop_cancels_deferred_start() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();
        capture.stop();
        capture.start().unwrap();

        capture.stop();
        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Ended);
        assert_eq!(capture.sessions(), 1);
    }

    #[test]
    fn test_error_then_end_is_single_transition() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();

        assert_eq!(
            capture.handle_event(RecognitionEvent::Error("not-allowed".into())),
            CaptureSignal::Failed(CaptureErrorKind::NotAllowed)
        );
        assert_eq!(capture.handle_event(RecognitionEvent::End), CaptureSignal::Ignored);
        assert_eq!(capture.phase(), CapturePhase::Idle);
    }

    #[test]
    fn test_results_after_stop_are_dropped() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();
        capture.handle_event(RecognitionEvent::Results(vec![RecognitionResult::interim("hel")]));
        capture.stop();

        let signal = capture
            .handle_event(RecognitionEvent::Results(vec![RecognitionResult::final_result("hello")]));
        assert_eq!(signal, CaptureSignal::Ignored);
        assert_eq!(capture.transcript(), "hel");
    }

    #[tokio::test]
    async fn test_transcript_stream_ends_with_session() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        let stream = capture.transcripts();

        capture.start().unwrap();
        capture.handle_event(RecognitionEvent::Results(vec![RecognitionResult::interim("what")]));
        capture.handle_event(RecognitionEvent::Results(vec![RecognitionResult::interim(
            "what are",
        )]));
        capture.handle_event(RecognitionEvent::End);

        let seen: Vec<String> = stream.collect().await;
        assert_eq!(seen, ["what", "what are"]);
    }

    #[test]
    fn test_refused_restart_reports_failure() {
        let mic = Arc::new(Mic::default());
        let capture = controller(&mic);
        capture.start().unwrap();
        capture.stop();
        capture.start().unwrap();

        mic.refuse.store(true, Ordering::SeqCst);
        assert!(matches!(
            capture.handle_event(RecognitionEvent::End),
            CaptureSignal::RestartFailed(_)
        ));
        assert_eq!(capture.phase(), CapturePhase::Idle);
        assert!(!capture.is_active());
    }
}
