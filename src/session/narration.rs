//! Narration text for cooking sessions

use crate::language::Language;
use crate::recipe::Step;

/// What is spoken when a step begins
///
/// "Step 2 of 5. Fry the onions. This step takes approximately 3 minutes.
/// Say 'start' when you're ready to begin the timer."
#[must_use]
pub fn step_text(language: &Language, index: usize, total: usize, step: &Step) -> String {
    let mut text = format!(
        "{}. {}",
        language.step_text(index + 1, total),
        step.instruction.trim()
    );

    let duration = language.duration_text(step.estimate_seconds);
    if !duration.is_empty() {
        text.push(' ');
        text.push_str(&duration);
    }

    text.push(' ');
    text.push_str(language.command_prompt(step.has_timer()));
    text
}

/// What is spoken once the last step is done
#[must_use]
pub const fn completion_text(language: &Language) -> &'static str {
    language.completion
}
