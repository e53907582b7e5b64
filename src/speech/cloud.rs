//! Cloud voice backend
//!
//! Synthesizes MP3 through `OpenAI` or ElevenLabs and plays it on the default
//! output device. Each utterance runs on its own task; cancelling raises a
//! stop flag the playback loop polls and aborts the task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use super::playback::AudioPlayback;
use super::{SignalSink, SpeechBackend, SpeechOptions, Voice};
use crate::config::{SpeechConfig, TtsProvider};
use crate::{Error, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_SPEECH_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

const OPENAI_DEFAULT_VOICE: &str = "alloy";
const OPENAI_DEFAULT_MODEL: &str = "tts-1";
// "Rachel"
const ELEVENLABS_DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
const ELEVENLABS_DEFAULT_MODEL: &str = "eleven_multilingual_v2";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Provider {
    OpenAi,
    ElevenLabs,
}

/// Synthesizes speech from text
#[derive(Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    model: String,
    provider: Provider,
}

impl TextToSpeech {
    /// Create a TTS client using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            model,
            provider: Provider::OpenAi,
        })
    }

    /// Create a TTS client using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            model,
            provider: Provider::ElevenLabs,
        })
    }

    /// Build the client the speech config asks for
    ///
    /// Returns `Ok(None)` for the local provider.
    ///
    /// # Errors
    ///
    /// Returns error if a cloud provider is selected without its API key
    pub fn from_config(config: &SpeechConfig, api_key: Option<&str>) -> Result<Option<Self>> {
        let key = || api_key.unwrap_or_default().to_string();
        let tts = match config.provider {
            TtsProvider::Local => return Ok(None),
            TtsProvider::OpenAi => Self::new_openai(
                key(),
                config.voice.clone().unwrap_or_else(|| OPENAI_DEFAULT_VOICE.to_string()),
                config.model.clone().unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            )?,
            TtsProvider::ElevenLabs => Self::new_elevenlabs(
                key(),
                config.voice.clone().unwrap_or_else(|| ELEVENLABS_DEFAULT_VOICE.to_string()),
                config.model.clone().unwrap_or_else(|| ELEVENLABS_DEFAULT_MODEL.to_string()),
            )?,
        };
        Ok(Some(tts))
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, rate: f64) -> Result<Vec<u8>> {
        match self.provider {
            Provider::OpenAi => self.synthesize_openai(text, rate).await,
            Provider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    async fn synthesize_openai(&self, text: &str, rate: f64) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            // accepted range of the speech endpoint
            speed: rate.clamp(0.25, 4.0),
        };

        let response = self
            .client
            .post(OPENAI_SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{ELEVENLABS_SPEECH_URL}/{}", self.voice);
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

struct Playing {
    task: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// [`SpeechBackend`] speaking through a cloud TTS service
pub struct CloudVoice {
    tts: TextToSpeech,
    playing: Option<Playing>,
}

impl CloudVoice {
    #[must_use]
    pub const fn new(tts: TextToSpeech) -> Self {
        Self { tts, playing: None }
    }
}

impl SpeechBackend for CloudVoice {
    fn name(&self) -> &'static str {
        match self.tts.provider {
            Provider::OpenAi => "openai",
            Provider::ElevenLabs => "elevenlabs",
        }
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(
        &mut self,
        text: &str,
        _voice: Option<&Voice>,
        options: &SpeechOptions,
        sink: SignalSink,
    ) -> Result<()> {
        self.cancel();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Speech(format!("cloud voice needs a tokio runtime: {e}")))?;

        let stop = Arc::new(AtomicBool::new(false));
        let tts = self.tts.clone();
        let text = text.to_string();
        let options = *options;
        let task_stop = Arc::clone(&stop);

        let task = runtime.spawn(async move {
            let audio = match tts.synthesize(&text, options.rate).await {
                Ok(audio) => audio,
                Err(e) => {
                    sink.failed(e.to_string());
                    return;
                }
            };
            if task_stop.load(Ordering::SeqCst) {
                return;
            }

            sink.started();
            let stop = Arc::clone(&task_stop);
            let played = tokio::task::spawn_blocking(move || {
                AudioPlayback::new()?.play_mp3(&audio, options.volume, &stop)
            })
            .await;

            match played {
                Ok(Ok(true)) => sink.ended(),
                // stopped by cancel
                Ok(Ok(false)) => {}
                Ok(Err(e)) => sink.failed(e.to_string()),
                Err(e) => sink.failed(format!("playback task failed: {e}")),
            }
        });

        self.playing = Some(Playing { task, stop });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(playing) = self.playing.take() {
            playing.stop.store(true, Ordering::SeqCst);
            playing.task.abort();
        }
    }
}

impl Drop for CloudVoice {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_provider_builds_no_client() {
        let config = SpeechConfig::default();
        assert!(TextToSpeech::from_config(&config, Some("key")).unwrap().is_none());
    }

    #[test]
    fn cloud_provider_requires_key() {
        let config = SpeechConfig {
            provider: TtsProvider::OpenAi,
            ..SpeechConfig::default()
        };
        assert!(matches!(
            TextToSpeech::from_config(&config, None),
            Err(Error::Config(_))
        ));

        let tts = TextToSpeech::from_config(&config, Some("sk-test")).unwrap().unwrap();
        assert_eq!(tts.voice, OPENAI_DEFAULT_VOICE);
        assert_eq!(tts.model, OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn elevenlabs_uses_configured_voice() {
        let config = SpeechConfig {
            provider: TtsProvider::ElevenLabs,
            voice: Some("voice-123".to_string()),
            ..SpeechConfig::default()
        };
        let voice = CloudVoice::new(TextToSpeech::from_config(&config, Some("xi")).unwrap().unwrap());
        assert_eq!(voice.name(), "elevenlabs");
        assert_eq!(voice.tts.voice, "voice-123");
        assert!(voice.voices().is_empty());
    }

    #[test]
    fn cancel_without_playback_is_noop() {
        let tts = TextToSpeech::new_openai("k".to_string(), "alloy".to_string(), "tts-1".to_string()).unwrap();
        let mut voice = CloudVoice::new(tts);
        voice.cancel();
        voice.cancel();
        assert!(voice.playing.is_none());
    }
}
