//! Voice command listener
//!
//! Wraps a continuous speech recognizer and waits for the language's start
//! keyword. The recognizer reports progress as [`RecognitionSignal`]s; the
//! listener folds them into [`ListenerOutcome`]s the session driver acts on:
//! a detection, a scheduled restart, or a terminal failure that leaves the
//! session on manual control.

pub mod retry;
pub mod typed;

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::Result;
use retry::{RestartBudget, RestartPolicy};

pub use typed::{TypedInput, TypedRecognizer};

/// Identifies one recognition start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecognitionSession(pub u64);

impl fmt::Display for RecognitionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// Error reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Silence timeout; harmless
    NoSpeech,
    /// Session was stopped deliberately
    Aborted,
    PermissionDenied,
    Network,
    ServiceUnavailable,
    Other(String),
}

impl RecognitionErrorKind {
    /// Errors after which restarting is pointless
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::Network | Self::ServiceUnavailable
        )
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpeech => f.write_str("no speech"),
            Self::Aborted => f.write_str("aborted"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::Network => f.write_str("network unavailable"),
            Self::ServiceUnavailable => f.write_str("service unavailable"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionSignalKind {
    Started,
    Result { transcript: String, is_final: bool },
    Error(RecognitionErrorKind),
    /// Engine stopped listening
    Ended,
}

/// Event from a recognition engine, tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSignal {
    pub session: RecognitionSession,
    pub kind: RecognitionSignalKind,
}

/// A continuous speech-to-text engine
pub trait RecognitionBackend: Send {
    fn name(&self) -> &'static str;

    /// Open a recognition session; events for it are sent on `signals`
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start
    fn start(
        &mut self,
        language: &str,
        session: RecognitionSession,
        signals: mpsc::UnboundedSender<RecognitionSignal>,
    ) -> Result<()>;

    /// Close the open session, if any
    fn stop(&mut self);
}

/// Access to the microphone
pub trait MicrophonePermission: Send {
    /// Ask for access; `true` when granted
    fn request(&mut self) -> bool;
}

/// Permission answered from configuration
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl MicrophonePermission for StaticPermission {
    fn request(&mut self) -> bool {
        self.0
    }
}

/// Why voice control is unavailable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerFailure {
    PermissionDenied,
    /// Network or service failure
    Fatal(RecognitionErrorKind),
    RetriesExhausted { attempts: u32 },
    StartFailed(String),
}

impl ListenerFailure {
    /// User-facing notice
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Microphone access was denied. Use the Start button to continue.".to_string()
            }
            Self::Fatal(kind) => {
                format!("Voice recognition stopped ({kind}). Use the Start button to continue.")
            }
            Self::RetriesExhausted { .. } => {
                "Voice recognition keeps stopping. Use the Start button to continue.".to_string()
            }
            Self::StartFailed(reason) => {
                format!("Voice recognition is unavailable ({reason}). Use the Start button to continue.")
            }
        }
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => f.write_str("microphone permission denied"),
            Self::Fatal(kind) => write!(f, "fatal recognition error: {kind}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "recognition restart limit reached after {attempts} attempts")
            }
            Self::StartFailed(reason) => write!(f, "recognition failed to start: {reason}"),
        }
    }
}

/// What the driver should do after a recognition signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// Nothing to do
    Ignored,
    /// Start keyword heard; the listener has already stopped
    Detected,
    /// Call [`VoiceCommandListener::restart`] for `session` after `delay`
    RestartAfter {
        session: RecognitionSession,
        delay: Duration,
    },
    /// Voice control gave up; fall back to manual control
    Failed(ListenerFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListenerState {
    Idle,
    Listening(RecognitionSession),
    RestartPending(RecognitionSession),
    Failed(ListenerFailure),
}

/// Listens for the localized start command
pub struct VoiceCommandListener {
    backend: Box<dyn RecognitionBackend>,
    permission: Box<dyn MicrophonePermission>,
    permission_granted: bool,
    signals: mpsc::UnboundedSender<RecognitionSignal>,
    budget: RestartBudget,
    state: ListenerState,
    next_session: u64,
    language: String,
    keyword: String,
}

impl VoiceCommandListener {
    #[must_use]
    pub fn new(
        backend: Box<dyn RecognitionBackend>,
        permission: Box<dyn MicrophonePermission>,
        policy: RestartPolicy,
        signals: mpsc::UnboundedSender<RecognitionSignal>,
    ) -> Self {
        Self {
            backend,
            permission,
            permission_granted: false,
            signals,
            budget: RestartBudget::new(policy),
            state: ListenerState::Idle,
            next_session: 0,
            language: String::new(),
            keyword: String::new(),
        }
    }

    /// Whether a recognition session is open
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ListenerState::Listening(_))
    }

    /// Terminal failure from the last listening phase, if any
    #[must_use]
    pub const fn failure(&self) -> Option<&ListenerFailure> {
        match &self.state {
            ListenerState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Restarts consumed in the current listening phase
    #[must_use]
    pub const fn restart_attempts(&self) -> u32 {
        self.budget.attempts()
    }

    /// Begin waiting for `keyword` spoken in `language`
    ///
    /// Asks for microphone access the first time; a grant is remembered.
    ///
    /// # Errors
    ///
    /// Returns the failure that leaves the caller on manual control
    pub fn listen(
        &mut self,
        language: &str,
        keyword: &str,
        now: Instant,
    ) -> std::result::Result<(), ListenerFailure> {
        self.stop();
        self.language = language.to_string();
        self.keyword = keyword.trim().to_lowercase();
        self.budget.reset();

        if !self.permission_granted {
            self.permission_granted = self.permission.request();
            if !self.permission_granted {
                tracing::warn!("microphone permission denied, voice commands disabled");
                return Err(self.fail(ListenerFailure::PermissionDenied));
            }
            tracing::debug!("microphone permission granted");
        }

        self.start_session(now)
    }

    /// Restart after a scheduled delay; stale or cancelled restarts are no-ops
    ///
    /// # Errors
    ///
    /// Returns the failure if the engine refuses to start again
    pub fn restart(
        &mut self,
        session: RecognitionSession,
        now: Instant,
    ) -> std::result::Result<bool, ListenerFailure> {
        if self.state != ListenerState::RestartPending(session) {
            tracing::debug!(%session, "dropping stale restart");
            return Ok(false);
        }
        tracing::debug!(%session, attempt = self.budget.attempts(), "restarting recognition");
        self.start_session(now).map(|()| true)
    }

    /// Stop listening; safe to call in any state
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, ListenerState::Idle) {
            ListenerState::Listening(session) => {
                tracing::debug!(%session, "stopping recognition");
                self.backend.stop();
            }
            ListenerState::RestartPending(session) => {
                tracing::debug!(%session, "cancelling pending restart");
            }
            ListenerState::Idle | ListenerState::Failed(_) => {}
        }
    }

    /// Fold a recognition signal into the listener state
    pub fn on_signal(&mut self, signal: RecognitionSignal, now: Instant) -> ListenerOutcome {
        let current = match &self.state {
            ListenerState::Listening(s) | ListenerState::RestartPending(s) => *s,
            ListenerState::Idle | ListenerState::Failed(_) => return ListenerOutcome::Ignored,
        };
        if signal.session != current {
            tracing::trace!(session = %signal.session, "stale recognition signal");
            return ListenerOutcome::Ignored;
        }
        let pending = matches!(self.state, ListenerState::RestartPending(_));

        match signal.kind {
            RecognitionSignalKind::Started => {
                tracing::debug!(session = %current, "recognition started");
                ListenerOutcome::Ignored
            }
            RecognitionSignalKind::Result { transcript, is_final } => {
                self.budget.reset();
                let heard = transcript.to_lowercase();
                tracing::debug!(transcript = %heard, is_final, "heard");

                if !self.keyword.is_empty() && heard.contains(&self.keyword) {
                    tracing::info!(keyword = %self.keyword, "start command detected");
                    self.stop();
                    ListenerOutcome::Detected
                } else {
                    ListenerOutcome::Ignored
                }
            }
            RecognitionSignalKind::Error(RecognitionErrorKind::NoSpeech) => {
                tracing::trace!("no speech, still listening");
                ListenerOutcome::Ignored
            }
            RecognitionSignalKind::Error(RecognitionErrorKind::Aborted) => ListenerOutcome::Ignored,
            RecognitionSignalKind::Error(kind) if kind.is_fatal() => {
                tracing::warn!(error = %kind, "recognition failed, falling back to manual control");
                self.backend.stop();
                let failure = if kind == RecognitionErrorKind::PermissionDenied {
                    self.permission_granted = false;
                    ListenerFailure::PermissionDenied
                } else {
                    ListenerFailure::Fatal(kind)
                };
                ListenerOutcome::Failed(self.fail(failure))
            }
            RecognitionSignalKind::Error(kind) => {
                if pending {
                    return ListenerOutcome::Ignored;
                }
                tracing::debug!(error = %kind, "recognition error, scheduling restart");
                self.schedule_restart(current, now)
            }
            RecognitionSignalKind::Ended => {
                if pending {
                    return ListenerOutcome::Ignored;
                }
                self.schedule_restart(current, now)
            }
        }
    }

    fn schedule_restart(&mut self, session: RecognitionSession, now: Instant) -> ListenerOutcome {
        match self.budget.next_restart(now) {
            Some(delay) => {
                tracing::debug!(%session, attempt = self.budget.attempts(), ?delay, "recognition ended, restart scheduled");
                self.state = ListenerState::RestartPending(session);
                ListenerOutcome::RestartAfter { session, delay }
            }
            None => {
                let attempts = self.budget.attempts();
                tracing::warn!(attempts, "recognition restart limit reached, falling back to manual control");
                self.backend.stop();
                ListenerOutcome::Failed(self.fail(ListenerFailure::RetriesExhausted { attempts }))
            }
        }
    }

    fn start_session(&mut self, now: Instant) -> std::result::Result<(), ListenerFailure> {
        self.next_session += 1;
        let session = RecognitionSession(self.next_session);

        if let Err(e) = self
            .backend
            .start(&self.language, session, self.signals.clone())
        {
            tracing::warn!(error = %e, backend = self.backend.name(), "recognition failed to start");
            return Err(self.fail(ListenerFailure::StartFailed(e.to_string())));
        }

        self.budget.record_start(now);
        self.state = ListenerState::Listening(session);
        tracing::debug!(%session, language = %self.language, keyword = %self.keyword, "listening for start command");
        Ok(())
    }

    fn fail(&mut self, failure: ListenerFailure) -> ListenerFailure {
        self.state = ListenerState::Failed(failure.clone());
        failure
    }
}

impl Drop for VoiceCommandListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::Error;

    #[derive(Debug, Default)]
    struct Log {
        starts: Vec<RecognitionSession>,
        stops: usize,
    }

    struct FakeEngine {
        log: Arc<Mutex<Log>>,
        refuse: bool,
    }

    impl RecognitionBackend for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn start(&mut self, _: &str, session: RecognitionSession, _: mpsc::UnboundedSender<RecognitionSignal>) -> Result<()> {
            if self.refuse {
                return Err(Error::Recognition("no engine".to_string()));
            }
            self.log.lock().unwrap().starts.push(session);
            Ok(())
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().stops += 1;
        }
    }

    struct CountingPermission {
        grant: bool,
        asked: Arc<Mutex<u32>>,
    }

    impl MicrophonePermission for CountingPermission {
        fn request(&mut self) -> bool {
            *self.asked.lock().unwrap() += 1;
            self.grant
        }
    }

    fn listener(grant: bool, max_attempts: u32) -> (VoiceCommandListener, Arc<Mutex<Log>>, Arc<Mutex<u32>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let asked = Arc::new(Mutex::new(0));
        let (tx, _rx) = mpsc::unbounded_channel();
        let listener = VoiceCommandListener::new(
            Box::new(FakeEngine {
                log: Arc::clone(&log),
                refuse: false,
            }),
            Box::new(CountingPermission {
                grant,
                asked: Arc::clone(&asked),
            }),
            RestartPolicy {
                max_attempts,
                min_interval: Duration::from_secs(1),
            },
            tx,
        );
        (listener, log, asked)
    }

    fn signal(session: RecognitionSession, kind: RecognitionSignalKind) -> RecognitionSignal {
        RecognitionSignal { session, kind }
    }

    fn heard(session: RecognitionSession, text: &str) -> RecognitionSignal {
        signal(
            session,
            RecognitionSignalKind::Result {
                transcript: text.to_string(),
                is_final: false,
            },
        )
    }

    #[test]
    fn detects_keyword_by_containment() {
        let (mut listener, log, _) = listener(true, 5);
        let now = Instant::now();
        listener.listen("en-US", "Start", now).unwrap();
        let session = log.lock().unwrap().starts[0];

        assert_eq!(listener.on_signal(heard(session, "okay wait"), now), ListenerOutcome::Ignored);
        assert_eq!(
            listener.on_signal(heard(session, "OK let's START now"), now),
            ListenerOutcome::Detected
        );
        assert!(!listener.is_active());
        assert_eq!(log.lock().unwrap().stops, 1);
    }

    #[test]
    fn permission_is_cached_once_granted() {
        let (mut listener, _, asked) = listener(true, 5);
        let now = Instant::now();
        listener.listen("en-US", "start", now).unwrap();
        listener.listen("en-US", "start", now).unwrap();
        assert_eq!(*asked.lock().unwrap(), 1);
    }

    #[test]
    fn denied_permission_fails_without_starting() {
        let (mut listener, log, _) = listener(false, 5);
        let err = listener.listen("en-US", "start", Instant::now()).unwrap_err();
        assert_eq!(err, ListenerFailure::PermissionDenied);
        assert!(log.lock().unwrap().starts.is_empty());
        assert_eq!(listener.failure(), Some(&ListenerFailure::PermissionDenied));
        assert!(err.notice().contains("Start button"));
    }

    #[test]
    fn transient_errors_keep_listening() {
        let (mut listener, log, _) = listener(true, 5);
        let now = Instant::now();
        listener.listen("en-US", "start", now).unwrap();
        let session = log.lock().unwrap().starts[0];

        for kind in [RecognitionErrorKind::NoSpeech, RecognitionErrorKind::Aborted] {
            assert_eq!(
                listener.on_signal(signal(session, RecognitionSignalKind::Error(kind)), now),
                ListenerOutcome::Ignored
            );
        }
        assert!(listener.is_active());
        assert_eq!(listener.restart_attempts(), 0);
    }

    #[test]
    fn fatal_error_is_terminal() {
        let (mut listener, log, _) = listener(true, 5);
        let now = Instant::now();
        listener.listen("en-US", "start", now).unwrap();
        let session = log.lock().unwrap().starts[0];

        let outcome = listener.on_signal(
            signal(session, RecognitionSignalKind::Error(RecognitionErrorKind::Network)),
            now,
        );
        assert_eq!(
            outcome,
            ListenerOutcome::Failed(ListenerFailure::Fatal(RecognitionErrorKind::Network))
        );
        // the trailing end event must not schedule a restart
        assert_eq!(
            listener.on_signal(signal(session, RecognitionSignalKind::Ended), now),
            ListenerOutcome::Ignored
        );
    }

    #[test]
    fn error_then_end_restarts_once() {
        let (mut listener, log, _) = listener(true, 5);
        let t0 = Instant::now();
        listener.listen("en-US", "start", t0).unwrap();
        let session = log.lock().unwrap().starts[0];

        let outcome = listener.on_signal(
            signal(session, RecognitionSignalKind::Error(RecognitionErrorKind::Other("audio-capture".into()))),
            t0 + Duration::from_millis(300),
        );
        assert_eq!(
            outcome,
            ListenerOutcome::RestartAfter {
                session,
                delay: Duration::from_millis(700)
            }
        );
        assert_eq!(
            listener.on_signal(signal(session, RecognitionSignalKind::Ended), t0),
            ListenerOutcome::Ignored
        );
        assert_eq!(listener.restart_attempts(), 1);

        assert!(listener.restart(session, t0 + Duration::from_secs(1)).unwrap());
        assert!(listener.is_active());
        assert_eq!(log.lock().unwrap().starts.len(), 2);
    }

    #[test]
    fn restart_budget_is_bounded() {
        let (mut listener, log, _) = listener(true, 3);
        let mut now = Instant::now();
        listener.listen("en-US", "start", now).unwrap();

        for _ in 0..3 {
            let session = *log.lock().unwrap().starts.last().unwrap();
            now += Duration::from_secs(2);
            let outcome = listener.on_signal(signal(session, RecognitionSignalKind::Ended), now);
            assert!(matches!(outcome, ListenerOutcome::RestartAfter { .. }));
            assert!(listener.restart(session, now).unwrap());
        }

        let session = *log.lock().unwrap().starts.last().unwrap();
        let outcome = listener.on_signal(signal(session, RecognitionSignalKind::Ended), now);
        assert_eq!(
            outcome,
            ListenerOutcome::Failed(ListenerFailure::RetriesExhausted { attempts: 3 })
        );
        assert_eq!(log.lock().unwrap().starts.len(), 4);
    }

    #[test]
    fn stop_is_idempotent_and_cancels_restart() {
        let (mut listener, log, _) = listener(true, 5);
        let now = Instant::now();
        listener.stop();
        listener.listen("en-US", "start", now).unwrap();
        let session = log.lock().unwrap().starts[0];

        listener.on_signal(signal(session, RecognitionSignalKind::Ended), now);
        listener.stop();
        listener.stop();
        assert!(!listener.restart(session, now).unwrap());
        assert_eq!(log.lock().unwrap().starts.len(), 1);
    }

    #[test]
    fn stale_session_signals_are_ignored() {
        let (mut listener, log, _) = listener(true, 5);
        let now = Instant::now();
        listener.listen("en-US", "start", now).unwrap();
        let first = log.lock().unwrap().starts[0];
        listener.listen("en-US", "start", now).unwrap();

        assert_eq!(listener.on_signal(heard(first, "start"), now), ListenerOutcome::Ignored);
        assert!(listener.is_active());
    }

    #[test]
    fn engine_refusing_to_start_is_terminal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut listener = VoiceCommandListener::new(
            Box::new(FakeEngine {
                log: Arc::default(),
                refuse: true,
            }),
            Box::new(StaticPermission(true)),
            RestartPolicy::default(),
            tx,
        );
        let err = listener.listen("en-US", "start", Instant::now()).unwrap_err();
        assert!(matches!(err, ListenerFailure::StartFailed(_)));
    }
}
