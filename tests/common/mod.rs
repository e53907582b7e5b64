//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cookalong::listener::{
    RecognitionBackend, RecognitionErrorKind, RecognitionSession,
    RecognitionSignal, RecognitionSignalKind,
};
use cookalong::speech::{SignalSink, SpeechBackend, SpeechOptions, Voice};
use cookalong::{CookingSession, Recipe, Step};
use tokio::sync::mpsc;

/// Recipe with one timed and one untimed step
pub fn boil_water_recipe() -> Recipe {
    Recipe::new(
        "Salted water",
        vec!["1 l water".to_string(), "1 tsp salt".to_string()],
        vec![Step::new("Boil water", 300), Step::new("Add salt", 0)],
    )
}

pub fn recipe_with_steps(steps: &[(&str, u32)]) -> Recipe {
    Recipe::new(
        "Test recipe",
        Vec::new(),
        steps.iter().map(|(i, s)| Step::new(*i, *s)).collect(),
    )
}

/// How a [`FakeVoice`] handles utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceMode {
    /// Starts and ends straight away
    Instant,
    /// Starts, then waits for [`FakeVoice::finish`]
    Held,
    /// Refuses every utterance
    Refuse,
    /// Accepts, then reports a failure
    FailLater,
}

#[derive(Default)]
struct VoiceState {
    spoken: Vec<String>,
    held: Vec<SignalSink>,
    cancels: usize,
}

/// Speech backend recording what it was asked to say
#[derive(Clone)]
pub struct FakeVoice {
    mode: VoiceMode,
    state: Arc<Mutex<VoiceState>>,
}

impl FakeVoice {
    pub fn new(mode: VoiceMode) -> Self {
        Self {
            mode,
            state: Arc::default(),
        }
    }

    pub fn boxed(&self) -> Box<dyn SpeechBackend> {
        Box::new(self.clone())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.state.lock().unwrap().spoken.clone()
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    /// End every held utterance
    pub fn finish(&self) {
        for sink in self.state.lock().unwrap().held.drain(..) {
            sink.ended();
        }
    }
}

impl SpeechBackend for FakeVoice {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("fake", "en-US")]
    }

    fn speak(
        &mut self,
        text: &str,
        _voice: Option<&Voice>,
        _options: &SpeechOptions,
        sink: SignalSink,
    ) -> cookalong::Result<()> {
        if self.mode == VoiceMode::Refuse {
            return Err(cookalong::Error::Speech("voice unavailable".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        state.spoken.push(text.to_string());
        sink.started();
        match self.mode {
            VoiceMode::Instant => sink.ended(),
            VoiceMode::Held => state.held.push(sink),
            VoiceMode::FailLater => sink.failed("synthesis failed"),
            VoiceMode::Refuse => unreachable!(),
        }
        Ok(())
    }

    fn cancel(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.cancels += 1;
        state.held.clear();
    }
}

#[derive(Default)]
struct MicState {
    open: Option<(RecognitionSession, mpsc::UnboundedSender<RecognitionSignal>)>,
    starts: usize,
    stops: usize,
    refuse: bool,
}

/// Recognition backend driven by the test
#[derive(Clone, Default)]
pub struct FakeMic {
    state: Arc<Mutex<MicState>>,
}

impl FakeMic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn RecognitionBackend> {
        Box::new(self.clone())
    }

    /// Make every following start fail
    pub fn refuse_starts(&self) {
        self.state.lock().unwrap().refuse = true;
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open.is_some()
    }

    fn emit(&self, kind: RecognitionSignalKind) -> bool {
        let state = self.state.lock().unwrap();
        let Some((session, tx)) = state.open.as_ref() else {
            return false;
        };
        tx.send(RecognitionSignal {
            session: *session,
            kind,
        })
        .is_ok()
    }

    pub fn hear(&self, transcript: &str) -> bool {
        self.emit(RecognitionSignalKind::Result {
            transcript: transcript.to_string(),
            is_final: true,
        })
    }

    /// The engine stops on its own; it stays "open" until restarted
    pub fn end(&self) -> bool {
        self.emit(RecognitionSignalKind::Ended)
    }

    pub fn error(&self, kind: RecognitionErrorKind) -> bool {
        self.emit(RecognitionSignalKind::Error(kind))
    }
}

impl RecognitionBackend for FakeMic {
    fn name(&self) -> &'static str {
        "fake-mic"
    }

    fn start(
        &mut self,
        _language: &str,
        session: RecognitionSession,
        signals: mpsc::UnboundedSender<RecognitionSignal>,
    ) -> cookalong::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return Err(cookalong::Error::Recognition("engine busy".to_string()));
        }
        state.starts += 1;
        let _ = signals.send(RecognitionSignal {
            session,
            kind: RecognitionSignalKind::Started,
        });
        state.open = Some((session, signals));
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        state.open = None;
    }
}

/// Process backend signals until none arrives for `quiet` of virtual time
pub async fn settle_for(session: &mut CookingSession, quiet: Duration) {
    while let Ok(Some(signal)) = tokio::time::timeout(quiet, session.next_signal()).await {
        session
            .handle_signal(signal)
            .expect("signal handling failed");
    }
}

/// Process whatever is already queued
pub async fn settle(session: &mut CookingSession) {
    settle_for(session, Duration::from_millis(10)).await;
}

/// Process backend signals for `duration` of virtual time
pub async fn run_for(session: &mut CookingSession, duration: Duration) {
    let deadline = tokio::time::Instant::now() + duration;
    while let Ok(Some(signal)) = tokio::time::timeout_at(deadline, session.next_signal()).await {
        session
            .handle_signal(signal)
            .expect("signal handling failed");
    }
}
