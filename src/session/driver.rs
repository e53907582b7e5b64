//! Cooking session driver
//!
//! Owns the speech output, voice listener and countdown timer for one
//! recipe and runs the [`Machine`] against them: user commands and backend
//! signals go in as events, the returned effects are executed in order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::machine::{CommandSource, Effect, Epoch, Event, Machine, SessionSnapshot};
use crate::Result;
use crate::config::{Config, SpeechConfig};
use crate::feedback::{FeedbackSink, TasteRating};
use crate::language::{self, Language};
use crate::listener::retry::RestartPolicy;
use crate::listener::{
    ListenerOutcome, MicrophonePermission, RecognitionBackend, RecognitionSession,
    RecognitionSignal, StaticPermission, TypedRecognizer, VoiceCommandListener,
};
use crate::recipe::Recipe;
use crate::scaler::{self, ScaledRecipe};
use crate::speech::{
    ConsoleSynthesizer, NarrationEvent, SpeechBackend, SpeechOptions, SpeechOutput, SpeechSignal,
    UtteranceId,
};
use crate::timer::{CountdownTimer, TimerId, TimerSignal, TimerSignalKind};

/// Something the cook asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Start cooking, or the manual start button while waiting
    Start,
    Skip,
    Stop,
    Restart,
    RestartTimer,
    DismissNotice,
    Rate { axes: [u8; 6], notes: String },
    DeclineRating,
    Servings(u32),
}

/// A callback from one of the session's backends
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Speech(SpeechSignal),
    Recognition(RecognitionSignal),
    Timer(TimerSignal),
    /// A scheduled listener restart is due
    RestartDue(RecognitionSession),
}

/// Builds a [`CookingSession`]
pub struct CookingSessionBuilder {
    recipe: Recipe,
    language: &'static Language,
    servings: Option<u32>,
    options: SpeechOptions,
    platform_voice: Option<Box<dyn SpeechBackend>>,
    cloud_voice: Option<Box<dyn SpeechBackend>>,
    recognizer: Option<Box<dyn RecognitionBackend>>,
    permission: Box<dyn MicrophonePermission>,
    restart_policy: RestartPolicy,
    feedback: Option<Box<dyn FeedbackSink>>,
}

impl CookingSessionBuilder {
    #[must_use]
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            language: language::default_language(),
            servings: None,
            options: SpeechOptions::default(),
            platform_voice: None,
            cloud_voice: None,
            recognizer: None,
            permission: Box::new(StaticPermission(true)),
            restart_policy: RestartPolicy::default(),
            feedback: None,
        }
    }

    /// Apply language, servings, speech options and restart policy from `config`
    #[must_use]
    pub fn config(mut self, config: &Config) -> Self {
        self.language = language::lookup(&config.language);
        self.servings = config.servings;
        self.options = SpeechOptions::from(&config.speech);
        self.restart_policy = RestartPolicy::from(&config.listener);
        self.permission = Box::new(StaticPermission(config.listener.microphone));
        self
    }

    #[must_use]
    pub fn language(mut self, code: &str) -> Self {
        self.language = language::lookup(code);
        self
    }

    #[must_use]
    pub const fn servings(mut self, servings: u32) -> Self {
        self.servings = Some(servings);
        self
    }

    #[must_use]
    pub const fn speech_options(mut self, options: SpeechOptions) -> Self {
        self.options = options;
        self
    }

    /// Synthesizer used when there is no cloud voice or it fails
    #[must_use]
    pub fn platform_voice(mut self, voice: Box<dyn SpeechBackend>) -> Self {
        self.platform_voice = Some(voice);
        self
    }

    #[must_use]
    pub fn cloud_voice(mut self, voice: Box<dyn SpeechBackend>) -> Self {
        self.cloud_voice = Some(voice);
        self
    }

    #[must_use]
    pub fn recognizer(mut self, recognizer: Box<dyn RecognitionBackend>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: Box<dyn MicrophonePermission>) -> Self {
        self.permission = permission;
        self
    }

    #[must_use]
    pub const fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    #[must_use]
    pub fn feedback(mut self, sink: Box<dyn FeedbackSink>) -> Self {
        self.feedback = Some(sink);
        self
    }

    /// Create the session; unset backends default to the terminal
    /// synthesizer and typed transcripts
    #[must_use]
    pub fn build(self) -> CookingSession {
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();

        let platform: Box<dyn SpeechBackend> = match self.platform_voice {
            Some(voice) => voice,
            None => Box::new(ConsoleSynthesizer::stdout(&SpeechConfig::default())),
        };
        let mut speech = SpeechOutput::new(platform, speech_tx, self.options);
        if let Some(cloud) = self.cloud_voice {
            speech = speech.with_cloud(cloud);
        }

        let recognizer: Box<dyn RecognitionBackend> = match self.recognizer {
            Some(recognizer) => recognizer,
            None => Box::new(TypedRecognizer::new()),
        };
        let listener = VoiceCommandListener::new(
            recognizer,
            self.permission,
            self.restart_policy,
            recognition_tx,
        );

        let scaled = match self.servings {
            Some(servings) => scaler::scale(&self.recipe, servings),
            None => ScaledRecipe::unchanged(&self.recipe),
        };
        let machine = Machine::new(scaled.recipe.steps.clone(), self.language);
        let (snapshots, _) = watch::channel(machine.snapshot());

        CookingSession {
            recipe: self.recipe,
            scaled,
            machine,
            speech,
            listener,
            timer: CountdownTimer::new(timer_tx),
            feedback: self.feedback,
            speech_rx,
            recognition_rx,
            timer_rx,
            restart_tx,
            restart_rx,
            narration: None,
            listening: 0,
            timer_run: None,
            pending_restart: None,
            snapshots,
        }
    }
}

/// One recipe being cooked
pub struct CookingSession {
    recipe: Recipe,
    scaled: ScaledRecipe,
    machine: Machine,
    speech: SpeechOutput,
    listener: VoiceCommandListener,
    timer: CountdownTimer,
    feedback: Option<Box<dyn FeedbackSink>>,
    speech_rx: mpsc::UnboundedReceiver<SpeechSignal>,
    recognition_rx: mpsc::UnboundedReceiver<RecognitionSignal>,
    timer_rx: mpsc::UnboundedReceiver<TimerSignal>,
    restart_tx: mpsc::UnboundedSender<RecognitionSession>,
    restart_rx: mpsc::UnboundedReceiver<RecognitionSession>,
    /// Utterance narrating the current epoch
    narration: Option<(UtteranceId, Epoch)>,
    /// Epoch the listener was last started for
    listening: Epoch,
    timer_run: Option<(TimerId, Epoch)>,
    pending_restart: Option<JoinHandle<()>>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl CookingSession {
    #[must_use]
    pub fn builder(recipe: Recipe) -> CookingSessionBuilder {
        CookingSessionBuilder::new(recipe)
    }

    #[must_use]
    pub const fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// The recipe as cooked, scaled to the current servings
    #[must_use]
    pub const fn scaled(&self) -> &ScaledRecipe {
        &self.scaled
    }

    #[must_use]
    pub const fn language(&self) -> &'static Language {
        self.machine.language()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot()
    }

    /// Follow snapshot changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// How much longer or shorter steps take at the current servings
    #[must_use]
    pub fn time_adjustment(&self) -> String {
        scaler::time_adjustment_text(
            self.recipe.base_servings(),
            self.scaled.target_servings,
            self.language(),
        )
    }

    /// Rescale the recipe to `servings`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Recipe`] while a step is in progress
    pub fn set_servings(&mut self, servings: u32) -> Result<()> {
        let scaled = scaler::scale(&self.recipe, servings);
        self.machine.replace_steps(scaled.recipe.steps.clone())?;
        tracing::info!(servings = scaled.target_servings, factor = scaled.scale_factor, "recipe rescaled");
        self.scaled = scaled;
        self.publish();
        Ok(())
    }

    /// Apply a user command
    ///
    /// # Errors
    ///
    /// Returns an error when the recipe cannot be cooked, a rating is out of
    /// range, servings change mid-step, or a rating cannot be stored
    pub fn dispatch(&mut self, command: UserCommand) -> Result<()> {
        tracing::debug!(?command, "user command");
        let event = match command {
            UserCommand::Start if self.machine.phase() == super::Phase::Idle => Event::StartCooking,
            UserCommand::Start => Event::StartCommand(CommandSource::Manual),
            UserCommand::Skip => Event::SkipStep,
            UserCommand::Stop => Event::StopCooking,
            UserCommand::Restart => Event::RestartRecipe,
            UserCommand::RestartTimer => Event::RestartTimer,
            UserCommand::DismissNotice => Event::DismissNotice,
            UserCommand::Rate { axes, notes } => {
                Event::RatingSubmitted(TasteRating::new(self.recipe.id.clone(), axes, notes)?)
            }
            UserCommand::DeclineRating => Event::RatingDeclined,
            UserCommand::Servings(servings) => return self.set_servings(servings),
        };
        self.apply(event)
    }

    /// Wait for the next backend callback
    ///
    /// Returns `None` only once every backend channel is closed.
    pub async fn next_signal(&mut self) -> Option<SessionSignal> {
        tokio::select! {
            Some(signal) = self.speech_rx.recv() => Some(SessionSignal::Speech(signal)),
            Some(signal) = self.recognition_rx.recv() => Some(SessionSignal::Recognition(signal)),
            Some(signal) = self.timer_rx.recv() => Some(SessionSignal::Timer(signal)),
            Some(session) = self.restart_rx.recv() => Some(SessionSignal::RestartDue(session)),
            else => None,
        }
    }

    /// Fold a backend callback into the session
    ///
    /// # Errors
    ///
    /// Returns an error if a resulting rating cannot be stored
    pub fn handle_signal(&mut self, signal: SessionSignal) -> Result<()> {
        let now = tokio::time::Instant::now().into_std();
        let event = match signal {
            SessionSignal::Speech(signal) => match self.speech.on_signal(signal) {
                Some(NarrationEvent::Ended(id)) => {
                    self.narration_epoch(id).map(|epoch| Event::NarrationEnded { epoch })
                }
                Some(NarrationEvent::Failed(id, reason)) => self
                    .narration_epoch(id)
                    .map(|epoch| Event::NarrationFailed { epoch, reason }),
                None => None,
            },
            SessionSignal::Recognition(signal) => {
                let outcome = self.listener.on_signal(signal, now);
                self.listener_event(outcome)
            }
            SessionSignal::RestartDue(session) => match self.listener.restart(session, now) {
                Ok(_) => None,
                Err(failure) => Some(Event::ListenerUnavailable {
                    epoch: self.listening,
                    notice: failure.notice(),
                }),
            },
            SessionSignal::Timer(signal) => self.timer_event(signal),
        };

        match event {
            Some(event) => self.apply(event),
            None => Ok(()),
        }
    }

    /// Run until `commands` closes, logging rejected commands
    ///
    /// # Errors
    ///
    /// Returns an error if a rating cannot be stored
    pub async fn run(&mut self, mut commands: mpsc::Receiver<UserCommand>) -> Result<()> {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if let Err(e) = self.dispatch(command) {
                        tracing::warn!(error = %e, "command rejected");
                    }
                }
                Some(signal) = self.next_signal() => self.handle_signal(signal)?,
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Release speech, listener and timer
    pub fn shutdown(&mut self) {
        if self.machine.phase() != super::Phase::Idle {
            // stopping always succeeds
            let _ = self.apply(Event::StopCooking);
        }
        self.speech.cancel();
        self.listener.stop();
        self.timer.cancel();
        if let Some(task) = self.pending_restart.take() {
            task.abort();
        }
    }

    fn narration_epoch(&mut self, id: UtteranceId) -> Option<Epoch> {
        match self.narration {
            Some((current, epoch)) if current == id => {
                self.narration = None;
                Some(epoch)
            }
            _ => None,
        }
    }

    fn listener_event(&mut self, outcome: ListenerOutcome) -> Option<Event> {
        match outcome {
            ListenerOutcome::Ignored => None,
            ListenerOutcome::Detected => Some(Event::StartCommand(CommandSource::Voice {
                epoch: self.listening,
            })),
            ListenerOutcome::RestartAfter { session, delay } => {
                self.schedule_restart(session, delay);
                None
            }
            ListenerOutcome::Failed(failure) => Some(Event::ListenerUnavailable {
                epoch: self.listening,
                notice: failure.notice(),
            }),
        }
    }

    fn timer_event(&self, signal: TimerSignal) -> Option<Event> {
        let (run, epoch) = self.timer_run?;
        if run != signal.timer || !self.timer.is_current(signal.timer) {
            tracing::trace!(timer = signal.timer.0, "stale timer signal");
            return None;
        }
        Some(match signal.kind {
            TimerSignalKind::Tick { remaining } => Event::TimerTick { epoch, remaining },
            TimerSignalKind::Completed => Event::TimerCompleted { epoch },
        })
    }

    fn schedule_restart(&mut self, session: RecognitionSession, delay: Duration) {
        if let Some(task) = self.pending_restart.take() {
            task.abort();
        }
        let tx = self.restart_tx.clone();
        self.pending_restart = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(session);
        }));
    }

    /// Run `event` and everything it triggers through the machine
    fn apply(&mut self, event: Event) -> Result<()> {
        let mut queue = VecDeque::from([event]);
        let mut outcome = Ok(());

        while let Some(event) = queue.pop_front() {
            let effects = match self.machine.handle(event) {
                Ok(effects) => effects,
                Err(e) => {
                    outcome = Err(e);
                    continue;
                }
            };
            for effect in effects {
                if let Err(e) = self.execute(effect, &mut queue) {
                    tracing::warn!(error = %e, "session effect failed");
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
        }

        self.publish();
        outcome
    }

    fn execute(&mut self, effect: Effect, queue: &mut VecDeque<Event>) -> Result<()> {
        match effect {
            Effect::Speak { epoch, text } => {
                match self.speech.speak(&text, self.machine.language().code) {
                    Ok(id) => self.narration = Some((id, epoch)),
                    Err(e) => {
                        self.narration = None;
                        queue.push_back(Event::NarrationFailed {
                            epoch,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Effect::CancelSpeech => {
                self.narration = None;
                self.speech.cancel();
            }
            Effect::StartTimer { epoch, seconds } => {
                let id = self.timer.start(seconds);
                self.timer_run = Some((id, epoch));
            }
            Effect::CancelTimer => {
                self.timer_run = None;
                self.timer.cancel();
            }
            Effect::StartListening { epoch } => {
                self.listening = epoch;
                let language = self.machine.language();
                let now = tokio::time::Instant::now().into_std();
                if let Err(failure) = self.listener.listen(language.code, language.start_command, now) {
                    queue.push_back(Event::ListenerUnavailable {
                        epoch,
                        notice: failure.notice(),
                    });
                }
            }
            Effect::StopListening => {
                if let Some(task) = self.pending_restart.take() {
                    task.abort();
                }
                self.listener.stop();
            }
            Effect::PromptRating => {
                tracing::info!(recipe = %self.recipe.id, "asking for a taste rating");
            }
            Effect::SubmitRating(rating) => match self.feedback.as_ref() {
                Some(sink) => {
                    sink.submit(&rating)?;
                    tracing::info!(recipe = %rating.recipe_id, "taste rating saved");
                }
                None => tracing::debug!("no feedback store, rating dropped"),
            },
        }
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.machine.snapshot());
    }
}

impl Drop for CookingSession {
    fn drop(&mut self) {
        if let Some(task) = self.pending_restart.take() {
            task.abort();
        }
    }
}
