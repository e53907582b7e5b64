//! Cookalong - voice-guided cooking sessions
//!
//! This library provides the core of a hands-free recipe assistant:
//! - Step narration through a cloud voice or the local synthesizer
//! - A voice command listener waiting for the spoken "start" keyword
//! - Per-step countdown timers
//! - Recipe scaling with cooking-time adjustment
//! - Taste ratings that bias future recipe prompts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   CookingSession                     │
//! │        Machine (pure state machine) + driver         │
//! └───────┬──────────────────┬──────────────────┬───────┘
//!         │                  │                  │
//! ┌───────▼──────┐  ┌────────▼───────┐  ┌───────▼──────┐
//! │ SpeechOutput │  │ VoiceCommand-  │  │ Countdown-   │
//! │ cloud│local  │  │ Listener       │  │ Timer        │
//! └──────────────┘  └────────────────┘  └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod feedback;
pub mod language;
pub mod listener;
pub mod recipe;
pub mod scaler;
pub mod session;
pub mod speech;
pub mod timer;

pub use config::Config;
pub use error::{Error, Result};
pub use feedback::{FeedbackSink, JsonlRatingStore, TasteProfile, TasteRating};
pub use language::Language;
pub use listener::{TypedInput, TypedRecognizer, VoiceCommandListener};
pub use recipe::{Recipe, Step};
pub use scaler::ScaledRecipe;
pub use session::{CookingSession, Phase, SessionSnapshot, UserCommand};
pub use speech::SpeechOutput;
pub use timer::CountdownTimer;
