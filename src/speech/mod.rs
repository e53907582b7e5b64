//! Narration output
//!
//! Two interchangeable backends sit behind [`SpeechOutput`]: an optional
//! cloud voice and the platform synthesizer. Backends report progress as
//! [`SpeechSignal`]s on a channel owned by the session driver; the adapter
//! turns those into exactly one [`NarrationEvent`] per utterance.

pub mod adapter;
pub mod cloud;
pub mod console;
pub mod playback;

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::config::SpeechConfig;

pub use adapter::{NarrationEvent, SpeechOutput, select_voice};
pub use cloud::{CloudVoice, TextToSpeech};
pub use console::ConsoleSynthesizer;
pub use playback::AudioPlayback;

/// Identifies one call to [`SpeechOutput::speak`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utt-{}", self.0)
    }
}

/// Which backend produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendKind {
    Cloud,
    Platform,
}

/// Progress of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechSignalKind {
    Started,
    Ended,
    Failed(String),
}

/// Progress report from a speech backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSignal {
    pub utterance: UtteranceId,
    pub backend: BackendKind,
    pub kind: SpeechSignalKind,
}

/// Voice settings passed to every backend
///
/// Backends apply what they support; pitch is advisory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechOptions {
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl From<&SpeechConfig> for SpeechOptions {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

/// A voice a backend can speak with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: String,
    /// Language tag, e.g. "bn-IN"
    pub lang: String,
}

impl Voice {
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Sender handed to a backend for one utterance
#[derive(Debug, Clone)]
pub struct SignalSink {
    utterance: UtteranceId,
    backend: BackendKind,
    tx: mpsc::UnboundedSender<SpeechSignal>,
}

impl SignalSink {
    #[must_use]
    pub const fn new(
        utterance: UtteranceId,
        backend: BackendKind,
        tx: mpsc::UnboundedSender<SpeechSignal>,
    ) -> Self {
        Self {
            utterance,
            backend,
            tx,
        }
    }

    #[must_use]
    pub const fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    pub fn started(&self) {
        self.send(SpeechSignalKind::Started);
    }

    pub fn ended(&self) {
        self.send(SpeechSignalKind::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(SpeechSignalKind::Failed(reason.into()));
    }

    fn send(&self, kind: SpeechSignalKind) {
        // receiver gone means the session was torn down
        let _ = self.tx.send(SpeechSignal {
            utterance: self.utterance,
            backend: self.backend,
            kind,
        });
    }
}

/// A narration engine
pub trait SpeechBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Voices currently available; may be empty while still loading
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking `text`, reporting progress through `sink`
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the utterance outright
    fn speak(
        &mut self,
        text: &str,
        voice: Option<&Voice>,
        options: &SpeechOptions,
        sink: SignalSink,
    ) -> Result<()>;

    /// Stop any in-flight utterance; a no-op when idle
    fn cancel(&mut self);
}
