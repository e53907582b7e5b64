//! Typed transcripts
//!
//! A [`RecognitionBackend`] fed by text instead of a microphone, so a user
//! can type what they would have said. Typed sessions never time out.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::{RecognitionBackend, RecognitionSession, RecognitionSignal, RecognitionSignalKind};
use crate::Result;

type OpenSession = Option<(RecognitionSession, mpsc::UnboundedSender<RecognitionSignal>)>;

/// Recognizer whose transcripts come from a [`TypedInput`]
#[derive(Debug, Default)]
pub struct TypedRecognizer {
    open: Arc<Mutex<OpenSession>>,
}

/// Handle for submitting typed transcripts
#[derive(Debug, Clone)]
pub struct TypedInput {
    open: Arc<Mutex<OpenSession>>,
}

impl TypedRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used to type transcripts into this recognizer
    #[must_use]
    pub fn input(&self) -> TypedInput {
        TypedInput {
            open: Arc::clone(&self.open),
        }
    }
}

impl RecognitionBackend for TypedRecognizer {
    fn name(&self) -> &'static str {
        "typed"
    }

    fn start(
        &mut self,
        _language: &str,
        session: RecognitionSession,
        signals: mpsc::UnboundedSender<RecognitionSignal>,
    ) -> Result<()> {
        let _ = signals.send(RecognitionSignal {
            session,
            kind: RecognitionSignalKind::Started,
        });
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = Some((session, signals));
        Ok(())
    }

    fn stop(&mut self) {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl TypedInput {
    /// Deliver `text` as a final transcript
    ///
    /// Returns `false` when no recognition session is open.
    pub fn submit(&self, text: &str) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let Some((session, signals)) = open.as_ref() else {
            return false;
        };

        signals
            .send(RecognitionSignal {
                session: *session,
                kind: RecognitionSignalKind::Result {
                    transcript: text.to_string(),
                    is_final: true,
                },
            })
            .is_ok()
    }

    /// Whether a recognition session is open
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcripts_only_flow_while_listening() {
        let mut recognizer = TypedRecognizer::new();
        let input = recognizer.input();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(!input.submit("start"));

        recognizer.start("en-US", RecognitionSession(4), tx).unwrap();
        assert!(input.is_listening());
        assert_eq!(rx.try_recv().unwrap().kind, RecognitionSignalKind::Started);

        assert!(input.submit("start"));
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.session, RecognitionSession(4));
        assert_eq!(
            signal.kind,
            RecognitionSignalKind::Result {
                transcript: "start".to_string(),
                is_final: true
            }
        );

        recognizer.stop();
        recognizer.stop();
        assert!(!input.submit("start"));
        assert!(!input.is_listening());
    }
}
