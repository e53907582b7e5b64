//! Cooking session state machine
//!
//! Transitions are a pure function of `(state, event)`: [`Machine::handle`]
//! updates the session and returns the [`Effect`]s to execute, in order. The
//! driver owns the speech engine, listener and timer and feeds their
//! callbacks back as events.
//!
//! Every time the active driver of progress changes (a new narration, a new
//! listening phase, a new timer run) the machine moves to a new epoch.
//! Callback events carry the epoch they were issued for; anything from an
//! older epoch is stale and dropped, so a late timer completion can never
//! advance a step that was already skipped.

use serde::Serialize;

use super::narration;
use crate::feedback::TasteRating;
use crate::language::Language;
use crate::recipe::Step;
use crate::{Error, Result};

pub type Epoch = u64;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Speaking,
    WaitingForStart,
    TimerRunning,
    Complete,
}

impl Phase {
    /// Phases in which a step is in progress
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Speaking | Self::WaitingForStart | Self::TimerRunning
        )
    }
}

/// Where a start command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Keyword heard by the listener started in `epoch`
    Voice { epoch: Epoch },
    /// Button or typed command; always available
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartCooking,
    NarrationEnded { epoch: Epoch },
    NarrationFailed { epoch: Epoch, reason: String },
    StartCommand(CommandSource),
    TimerTick { epoch: Epoch, remaining: u32 },
    TimerCompleted { epoch: Epoch },
    /// Voice control gave up; manual control only
    ListenerUnavailable { epoch: Epoch, notice: String },
    SkipStep,
    StopCooking,
    RestartRecipe,
    RestartTimer,
    DismissNotice,
    RatingSubmitted(TasteRating),
    RatingDeclined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Speak { epoch: Epoch, text: String },
    CancelSpeech,
    StartTimer { epoch: Epoch, seconds: u32 },
    CancelTimer,
    StartListening { epoch: Epoch },
    StopListening,
    /// Offer the one-shot taste rating
    PromptRating,
    SubmitRating(TasteRating),
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    /// Zero-based; equals `total_steps` when complete
    pub step_index: usize,
    pub total_steps: usize,
    pub instruction: Option<String>,
    pub remaining_seconds: u32,
    pub listener_active: bool,
    pub notice: Option<String>,
    pub rating_pending: bool,
}

/// The cooking session controller
#[derive(Debug, Clone)]
pub struct Machine {
    steps: Vec<Step>,
    language: &'static Language,
    phase: Phase,
    step_index: usize,
    remaining: u32,
    listener_active: bool,
    notice: Option<String>,
    epoch: Epoch,
    completion_announced: bool,
    rating_pending: bool,
}

impl Machine {
    #[must_use]
    pub const fn new(steps: Vec<Step>, language: &'static Language) -> Self {
        Self {
            steps,
            language,
            phase: Phase::Idle,
            step_index: 0,
            remaining: 0,
            listener_active: false,
            notice: None,
            epoch: 0,
            completion_announced: false,
            rating_pending: false,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn step_index(&self) -> usize {
        self.step_index
    }

    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub const fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn language(&self) -> &'static Language {
        self.language
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.step_index)
    }

    /// Swap in a rescaled step list
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recipe`] while a step is in progress
    pub fn replace_steps(&mut self, steps: Vec<Step>) -> Result<()> {
        if self.phase.is_active() {
            return Err(Error::Recipe(
                "servings can only change before cooking starts or after it completes".to_string(),
            ));
        }
        if self.phase == Phase::Complete {
            self.step_index = steps.len();
        }
        self.steps = steps;
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            step_index: self.step_index,
            total_steps: self.steps.len(),
            instruction: self.current_step().map(|s| s.instruction.clone()),
            remaining_seconds: self.remaining,
            listener_active: self.listener_active,
            notice: self.notice.clone(),
            rating_pending: self.rating_pending,
        }
    }

    /// Apply one event
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recipe`] when cooking is started on a recipe without
    /// steps or with a blank instruction; the session stays idle
    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>> {
        let effects = match event {
            Event::StartCooking => return self.start_cooking(),
            Event::NarrationEnded { epoch } => self.narration_done(epoch, None),
            Event::NarrationFailed { epoch, reason } => self.narration_done(epoch, Some(reason)),
            Event::StartCommand(source) => self.start_command(source),
            Event::TimerTick { epoch, remaining } => {
                if self.is_current(Phase::TimerRunning, epoch) {
                    self.remaining = remaining;
                } else {
                    tracing::trace!(epoch, "stale timer tick");
                }
                Vec::new()
            }
            Event::TimerCompleted { epoch } => {
                if self.is_current(Phase::TimerRunning, epoch) {
                    tracing::info!(step = self.step_index + 1, "timer completed");
                    self.remaining = 0;
                    self.advance()
                } else {
                    tracing::debug!(epoch, "stale timer completion");
                    Vec::new()
                }
            }
            Event::ListenerUnavailable { epoch, notice } => {
                if self.is_current(Phase::WaitingForStart, epoch) {
                    tracing::warn!(%notice, "voice control unavailable");
                    self.listener_active = false;
                    self.notice = Some(notice);
                }
                Vec::new()
            }
            Event::SkipStep => {
                if self.phase.is_active() {
                    tracing::info!(step = self.step_index + 1, "step skipped");
                    self.advance()
                } else {
                    Vec::new()
                }
            }
            Event::StopCooking => self.stop(),
            Event::RestartRecipe => self.restart_recipe(),
            Event::RestartTimer => self.restart_timer(),
            Event::DismissNotice => {
                self.notice = None;
                Vec::new()
            }
            Event::RatingSubmitted(rating) => {
                if self.rating_pending {
                    self.rating_pending = false;
                    vec![Effect::SubmitRating(rating)]
                } else {
                    tracing::debug!("no rating pending");
                    Vec::new()
                }
            }
            Event::RatingDeclined => {
                self.rating_pending = false;
                Vec::new()
            }
        };
        Ok(effects)
    }

    fn start_cooking(&mut self) -> Result<Vec<Effect>> {
        if self.phase != Phase::Idle {
            tracing::debug!(phase = ?self.phase, "already cooking");
            return Ok(Vec::new());
        }
        self.validate()?;

        tracing::info!(steps = self.steps.len(), language = self.language.code, "cooking started");
        self.reset();
        Ok(self.narrate())
    }

    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::Recipe("recipe has no steps to cook".to_string()));
        }
        if let Some(index) = self
            .steps
            .iter()
            .position(|s| s.instruction.trim().is_empty())
        {
            return Err(Error::Recipe(format!("step {} has no instruction", index + 1)));
        }
        Ok(())
    }

    fn narration_done(&mut self, epoch: Epoch, failure: Option<String>) -> Vec<Effect> {
        if !self.is_current(Phase::Speaking, epoch) {
            tracing::debug!(epoch, "stale narration event");
            return Vec::new();
        }
        if let Some(reason) = failure {
            // carry on as if it had been spoken
            tracing::warn!(%reason, step = self.step_index + 1, "narration failed");
        }

        self.bump();
        self.phase = Phase::WaitingForStart;
        self.listener_active = true;
        vec![Effect::StartListening { epoch: self.epoch }]
    }

    fn start_command(&mut self, source: CommandSource) -> Vec<Effect> {
        if self.phase != Phase::WaitingForStart {
            tracing::debug!(phase = ?self.phase, "start command outside waiting phase");
            return Vec::new();
        }
        if let CommandSource::Voice { epoch } = source
            && epoch != self.epoch
        {
            tracing::debug!(epoch, "stale voice command");
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.listener_active {
            self.listener_active = false;
            effects.push(Effect::StopListening);
        }

        let seconds = self.current_step().map_or(0, |s| s.estimate_seconds);
        if seconds > 0 {
            tracing::info!(step = self.step_index + 1, seconds, ?source, "timer started");
            self.bump();
            self.phase = Phase::TimerRunning;
            self.remaining = seconds;
            effects.push(Effect::StartTimer {
                epoch: self.epoch,
                seconds,
            });
        } else {
            effects.extend(self.advance());
        }
        effects
    }

    /// Move past the current step, releasing whatever drives it first
    fn advance(&mut self) -> Vec<Effect> {
        let mut effects = self.release();
        self.step_index += 1;
        self.remaining = 0;

        if self.step_index < self.steps.len() {
            effects.extend(self.narrate());
            return effects;
        }

        self.step_index = self.steps.len();
        self.bump();
        self.phase = Phase::Complete;
        tracing::info!("recipe complete");

        if !self.completion_announced {
            self.completion_announced = true;
            self.rating_pending = true;
            effects.push(Effect::Speak {
                epoch: self.epoch,
                text: narration::completion_text(self.language).to_string(),
            });
            effects.push(Effect::PromptRating);
        }
        effects
    }

    fn narrate(&mut self) -> Vec<Effect> {
        let Some(step) = self.steps.get(self.step_index) else {
            return Vec::new();
        };
        let text = narration::step_text(self.language, self.step_index, self.steps.len(), step);
        let seconds = step.estimate_seconds;

        self.bump();
        self.phase = Phase::Speaking;
        self.remaining = seconds;
        tracing::info!(step = self.step_index + 1, total = self.steps.len(), "narrating step");
        vec![Effect::Speak {
            epoch: self.epoch,
            text,
        }]
    }

    fn stop(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }
        let effects = self.release();
        tracing::info!(step = self.step_index + 1, "cooking stopped");
        self.reset();
        self.bump();
        self.phase = Phase::Idle;
        effects
    }

    fn restart_recipe(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }
        let mut effects = self.release();
        tracing::info!("restarting recipe");
        self.reset();
        effects.extend(self.narrate());
        effects
    }

    fn restart_timer(&mut self) -> Vec<Effect> {
        let seconds = self.current_step().map_or(0, |s| s.estimate_seconds);
        match self.phase {
            Phase::TimerRunning => {
                self.bump();
                self.remaining = seconds;
                tracing::info!(step = self.step_index + 1, seconds, "timer restarted");
                vec![Effect::StartTimer {
                    epoch: self.epoch,
                    seconds,
                }]
            }
            Phase::WaitingForStart => {
                let mut effects = Vec::new();
                if self.listener_active {
                    effects.push(Effect::StopListening);
                }
                self.bump();
                self.remaining = seconds;
                self.notice = None;
                self.listener_active = true;
                tracing::info!(step = self.step_index + 1, "listening again");
                effects.push(Effect::StartListening { epoch: self.epoch });
                effects
            }
            Phase::Idle | Phase::Speaking | Phase::Complete => Vec::new(),
        }
    }

    /// Cleanup effects for whatever currently drives the session
    fn release(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.phase {
            Phase::Speaking | Phase::Complete => effects.push(Effect::CancelSpeech),
            Phase::TimerRunning => effects.push(Effect::CancelTimer),
            Phase::Idle | Phase::WaitingForStart => {}
        }
        if self.listener_active {
            self.listener_active = false;
            effects.push(Effect::StopListening);
        }
        effects
    }

    fn reset(&mut self) {
        self.step_index = 0;
        self.remaining = 0;
        self.listener_active = false;
        self.notice = None;
        self.completion_announced = false;
        self.rating_pending = false;
    }

    const fn bump(&mut self) {
        self.epoch += 1;
    }

    fn is_current(&self, phase: Phase, epoch: Epoch) -> bool {
        self.phase == phase && self.epoch == epoch
    }
}
