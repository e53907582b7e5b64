//! Terminal synthesizer
//!
//! Stands in for the platform text-to-speech engine: writes the narration to
//! a terminal and takes roughly as long as speaking it aloud would.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{SignalSink, SpeechBackend, SpeechOptions, Voice};
use crate::config::SpeechConfig;
use crate::{Error, Result};

/// [`SpeechBackend`] printing narration lines
pub struct ConsoleSynthesizer<W: Write + Send + 'static = io::Stdout> {
    out: Arc<Mutex<W>>,
    voices: Vec<Voice>,
    words_per_second: f64,
    speaking: Option<JoinHandle<()>>,
}

impl ConsoleSynthesizer<io::Stdout> {
    /// Synthesizer writing to stdout
    #[must_use]
    pub fn stdout(config: &SpeechConfig) -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())), config)
    }
}

impl<W: Write + Send + 'static> ConsoleSynthesizer<W> {
    #[must_use]
    pub fn new(out: Arc<Mutex<W>>, config: &SpeechConfig) -> Self {
        let voices = config
            .local_voices
            .iter()
            .map(|lang| Voice::new(format!("console ({lang})"), lang.clone()))
            .collect();

        Self {
            out,
            voices,
            words_per_second: config.words_per_second,
            speaking: None,
        }
    }

    /// Time it takes to "say" `text` at `rate`
    #[must_use]
    pub fn speaking_time(&self, text: &str, rate: f64) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let words = text.split_whitespace().count() as f64;
        let per_second = (self.words_per_second * rate).max(0.1);
        Duration::from_secs_f64(words / per_second)
    }
}

impl<W: Write + Send + 'static> SpeechBackend for ConsoleSynthesizer<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(
        &mut self,
        text: &str,
        voice: Option<&Voice>,
        options: &SpeechOptions,
        sink: SignalSink,
    ) -> Result<()> {
        self.cancel();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Speech(format!("console synthesizer needs a tokio runtime: {e}")))?;

        {
            let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
            match voice {
                Some(voice) => writeln!(out, "🔊 [{}] {text}", voice.lang)?,
                None => writeln!(out, "🔊 {text}")?,
            }
            out.flush()?;
        }

        let delay = self.speaking_time(text, options.rate);
        self.speaking = Some(runtime.spawn(async move {
            sink.started();
            tokio::time::sleep(delay).await;
            sink.ended();
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.speaking.take() {
            task.abort();
        }
    }
}

impl<W: Write + Send + 'static> Drop for ConsoleSynthesizer<W> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::speech::{BackendKind, SpeechSignalKind, UtteranceId};

    fn synth() -> (ConsoleSynthesizer<Vec<u8>>, Arc<Mutex<Vec<u8>>>) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let config = SpeechConfig {
            local_voices: vec!["en-US".to_string(), "hi-IN".to_string()],
            words_per_second: 2.0,
            ..SpeechConfig::default()
        };
        (ConsoleSynthesizer::new(Arc::clone(&out), &config), out)
    }

    #[test]
    fn advertises_configured_voices() {
        let (synth, _) = synth();
        let langs: Vec<String> = synth.voices().into_iter().map(|v| v.lang).collect();
        assert_eq!(langs, vec!["en-US", "hi-IN"]);
    }

    #[test]
    fn pacing_follows_rate() {
        let (synth, _) = synth();
        assert_eq!(synth.speaking_time("one two three four", 1.0), Duration::from_secs(2));
        assert_eq!(synth.speaking_time("one two three four", 2.0), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn prints_then_signals_start_and_end() {
        let (mut synth, out) = synth();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(UtteranceId(1), BackendKind::Platform, tx);
        let voice = Voice::new("hi", "hi-IN");

        synth
            .speak("Step 1 of 1. Boil water", Some(&voice), &SpeechOptions::default(), sink)
            .unwrap();
        let printed = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        assert!(printed.contains("[hi-IN] Step 1 of 1. Boil water"));

        assert_eq!(rx.recv().await.unwrap().kind, SpeechSignalKind::Started);
        assert_eq!(rx.recv().await.unwrap().kind, SpeechSignalKind::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_end() {
        let (mut synth, _) = synth();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(UtteranceId(7), BackendKind::Platform, tx);

        synth
            .speak("a long instruction indeed", None, &SpeechOptions::default(), sink)
            .unwrap();
        synth.cancel();
        synth.cancel();

        // the aborted task drops its sender, closing the channel
        while let Some(signal) = rx.recv().await {
            assert_ne!(signal.kind, SpeechSignalKind::Ended);
        }
    }
}
