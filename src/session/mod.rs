//! Cooking sessions
//!
//! [`Machine`] holds the step-by-step state machine; [`CookingSession`] wires
//! it to speech output, the voice command listener and the step timer.

mod driver;
pub mod machine;
pub mod narration;

pub use driver::{CookingSession, CookingSessionBuilder, SessionSignal, UserCommand};
pub use machine::{CommandSource, Effect, Epoch, Event, Machine, Phase, SessionSnapshot};
