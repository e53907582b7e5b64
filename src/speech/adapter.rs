//! Speech output adapter
//!
//! Prefers the cloud voice when one is configured and falls back to the
//! platform synthesizer for a single utterance when the cloud call fails.
//! Whatever happens underneath, the caller sees one [`NarrationEvent`] per
//! utterance that was not cancelled.

use tokio::sync::mpsc;

use super::{
    BackendKind, SignalSink, SpeechBackend, SpeechOptions, SpeechSignal, SpeechSignalKind,
    UtteranceId, Voice,
};
use crate::{Error, Result};

/// Terminal outcome of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationEvent {
    Ended(UtteranceId),
    /// Every backend failed
    Failed(UtteranceId, String),
}

#[derive(Debug)]
struct InFlight {
    id: UtteranceId,
    text: String,
    language: String,
    backend: BackendKind,
    started: bool,
}

/// Unified narration front end owned by a cooking session
pub struct SpeechOutput {
    cloud: Option<Box<dyn SpeechBackend>>,
    platform: Box<dyn SpeechBackend>,
    signals: mpsc::UnboundedSender<SpeechSignal>,
    options: SpeechOptions,
    next_id: u64,
    in_flight: Option<InFlight>,
}

impl SpeechOutput {
    /// Create an adapter; backend signals are sent on `signals`
    #[must_use]
    pub fn new(
        platform: Box<dyn SpeechBackend>,
        signals: mpsc::UnboundedSender<SpeechSignal>,
        options: SpeechOptions,
    ) -> Self {
        Self {
            cloud: None,
            platform,
            signals,
            options,
            next_id: 0,
            in_flight: None,
        }
    }

    /// Prefer `cloud` for every utterance
    #[must_use]
    pub fn with_cloud(mut self, cloud: Box<dyn SpeechBackend>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Utterance currently in flight, if any
    #[must_use]
    pub fn in_flight(&self) -> Option<UtteranceId> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    /// Whether the in-flight utterance has started producing audio
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.started)
    }

    /// Speak `text` in `language`, replacing any unfinished utterance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Speech`] if neither backend accepts the utterance; the
    /// returned id is never signalled in that case
    pub fn speak(&mut self, text: &str, language: &str) -> Result<UtteranceId> {
        self.cancel();

        self.next_id += 1;
        let id = UtteranceId(self.next_id);

        if let Some(cloud) = self.cloud.as_mut() {
            let sink = SignalSink::new(id, BackendKind::Cloud, self.signals.clone());
            match cloud.speak(text, None, &self.options, sink) {
                Ok(()) => {
                    tracing::debug!(utterance = %id, backend = cloud.name(), "narration queued");
                    self.track(id, text, language, BackendKind::Cloud);
                    return Ok(id);
                }
                Err(e) => {
                    tracing::warn!(utterance = %id, error = %e, "cloud voice refused, using platform synthesizer");
                }
            }
        }

        self.speak_platform(id, text, language)
            .map_err(|e| Error::Speech(format!("no speech backend available: {e}")))?;
        Ok(id)
    }

    /// Stop the in-flight utterance; no events are reported for it afterwards
    pub fn cancel(&mut self) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };

        tracing::debug!(utterance = %flight.id, started = flight.started, "cancelling narration");
        match flight.backend {
            BackendKind::Cloud => {
                if let Some(cloud) = self.cloud.as_mut() {
                    cloud.cancel();
                }
            }
            BackendKind::Platform => self.platform.cancel(),
        }
    }

    /// Fold a backend signal into the utterance lifecycle
    ///
    /// Returns the terminal event when the utterance is over. Signals for
    /// cancelled or superseded utterances are ignored.
    pub fn on_signal(&mut self, signal: SpeechSignal) -> Option<NarrationEvent> {
        let current = self.in_flight.as_mut()?;
        if current.id != signal.utterance || current.backend != signal.backend {
            tracing::debug!(utterance = %signal.utterance, backend = ?signal.backend, "stale speech signal");
            return None;
        }

        match signal.kind {
            SpeechSignalKind::Started => {
                current.started = true;
                None
            }
            SpeechSignalKind::Ended => {
                self.in_flight = None;
                Some(NarrationEvent::Ended(signal.utterance))
            }
            SpeechSignalKind::Failed(reason) if signal.backend == BackendKind::Cloud => {
                let flight = self.in_flight.take()?;
                tracing::warn!(utterance = %flight.id, %reason, "cloud narration failed, retrying on platform synthesizer");
                match self.speak_platform(flight.id, &flight.text, &flight.language) {
                    Ok(()) => None,
                    Err(e) => Some(NarrationEvent::Failed(flight.id, format!("{reason}; {e}"))),
                }
            }
            SpeechSignalKind::Failed(reason) => {
                self.in_flight = None;
                tracing::warn!(utterance = %signal.utterance, %reason, "narration failed");
                Some(NarrationEvent::Failed(signal.utterance, reason))
            }
        }
    }

    fn speak_platform(&mut self, id: UtteranceId, text: &str, language: &str) -> Result<()> {
        let voices = self.platform.voices();
        let voice = select_voice(&voices, language);
        let sink = SignalSink::new(id, BackendKind::Platform, self.signals.clone());

        self.platform.speak(text, voice, &self.options, sink)?;
        tracing::debug!(
            utterance = %id,
            backend = self.platform.name(),
            voice = voice.map(|v| v.name.as_str()),
            "narration queued"
        );
        self.track(id, text, language, BackendKind::Platform);
        Ok(())
    }

    fn track(&mut self, id: UtteranceId, text: &str, language: &str, backend: BackendKind) {
        self.in_flight = Some(InFlight {
            id,
            text: text.to_string(),
            language: language.to_string(),
            backend,
            started: false,
        });
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Pick a voice for `language`: exact tag, then language prefix, then the first voice
#[must_use]
pub fn select_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    if voices.is_empty() {
        tracing::warn!(language, "no voices available yet, using engine default");
        return None;
    }

    let prefix = language.split(['-', '_']).next().unwrap_or(language);
    voices
        .iter()
        .find(|v| v.lang.eq_ignore_ascii_case(language))
        .or_else(|| {
            voices.iter().find(|v| {
                v.lang
                    .split(['-', '_'])
                    .next()
                    .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
            })
        })
        .or_else(|| voices.first())
}
