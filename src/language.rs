//! Language catalog
//!
//! Maps a language code to the strings a cooking session speaks and listens
//! for: the localized "start" command, step and duration phrasing, and the
//! completion message. Unknown codes resolve to the default English entry.

use serde::Serialize;

/// Code of the language used when a lookup misses
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Localized words used to announce a step duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWords {
    pub minute: &'static str,
    pub minutes: &'static str,
    pub second: &'static str,
    pub seconds: &'static str,
    /// Lead-in, e.g. "This step takes approximately"
    pub takes: &'static str,
    /// Conjunction between the minute and second parts
    pub and: &'static str,
}

/// One entry of the language catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// BCP-47 style code, e.g. "hi-IN"
    pub code: &'static str,
    /// Display label
    pub label: &'static str,
    /// Keyword the voice listener waits for
    pub start_command: &'static str,
    /// Generic "say start when ready" prompt
    pub say_prompt: &'static str,
    /// Step counter template with `{n}` and `{total}` placeholders
    step_template: &'static str,
    /// Prompt closing the narration of a step that has a timer
    timer_prompt: &'static str,
    /// Prompt closing the narration of a step without a timer
    next_prompt: &'static str,
    /// Spoken once when the last step is done
    pub completion: &'static str,
    pub time: TimeWords,
    /// Templates with `{percent}` and `{servings}` placeholders
    time_increase: Option<&'static str>,
    time_decrease: Option<&'static str>,
}

const ENGLISH_TIME: TimeWords = TimeWords {
    minute: "minute",
    minutes: "minutes",
    second: "second",
    seconds: "seconds",
    takes: "This step takes approximately",
    and: "and",
};

const ENGLISH_INCREASE: &str =
    "Cooking time increases by approximately {percent}% for {servings} servings.";
const ENGLISH_DECREASE: &str =
    "Cooking time decreases by approximately {percent}% for {servings} servings.";

const fn english(code: &'static str, label: &'static str) -> Language {
    Language {
        code,
        label,
        start_command: "start",
        say_prompt: "Say 'start' when you're ready",
        step_template: "Step {n} of {total}",
        timer_prompt: "Say 'start' when you're ready to begin the timer.",
        next_prompt: "Say 'start' when you're ready for the next step.",
        completion: "Congratulations! You have completed the recipe.",
        time: ENGLISH_TIME,
        time_increase: Some(ENGLISH_INCREASE),
        time_decrease: Some(ENGLISH_DECREASE),
    }
}

/// Every supported language, default first
pub static LANGUAGES: &[Language] = &[
    english("en-US", "English (American)"),
    english("en-IN", "English (Indian)"),
    english("en-GB", "English (British)"),
    Language {
        code: "hi-IN",
        label: "Hindi",
        start_command: "शुरू",
        say_prompt: "'शुरू' बोलें जब आप तैयार हों",
        step_template: "कदम {n} का {total}",
        timer_prompt: "'शुरू' बोलें जब आप तैयार हों।",
        next_prompt: "'शुरू' बोलें जब आप तैयार हों।",
        completion: "बधाई हो! आपने रेसिपी पूरी कर ली है।",
        time: TimeWords {
            minute: "मिनट",
            minutes: "मिनट",
            second: "सेकंड",
            seconds: "सेकंड",
            takes: "यह कदम लगभग लेता है",
            and: "और",
        },
        time_increase: Some(
            "{servings} सर्विंग्स के लिए खाना पकाने का समय लगभग {percent}% बढ़ जाता है।",
        ),
        time_decrease: Some(
            "{servings} सर्विंग्स के लिए खाना पकाने का समय लगभग {percent}% कम हो जाता है।",
        ),
    },
    Language {
        code: "bn-IN",
        label: "Bengali",
        start_command: "শুরু",
        say_prompt: "'শুরু' বলুন যখন আপনি প্রস্তুত",
        step_template: "ধাপ {n} এর {total}",
        timer_prompt: "'শুরু' বলুন যখন আপনি প্রস্তুত।",
        next_prompt: "'শুরু' বলুন যখন আপনি প্রস্তুত।",
        completion: "অভিনন্দন! আপনি রেসিপিটি সম্পন্ন করেছেন।",
        time: TimeWords {
            minute: "মিনিট",
            minutes: "মিনিট",
            second: "সেকেন্ড",
            seconds: "সেকেন্ড",
            takes: "এই ধাপে প্রায় সময় লাগে",
            and: "এবং",
        },
        time_increase: Some("{servings} পরিবেশনের জন্য রান্নার সময় প্রায় {percent}% বৃদ্ধি পায়।"),
        time_decrease: Some("{servings} পরিবেশনের জন্য রান্নার সময় প্রায় {percent}% হ্রাস পায়।"),
    },
    Language {
        code: "ta-IN",
        label: "Tamil",
        start_command: "தொடங்கு",
        say_prompt: "நீங்கள் தயாராக இருக்கும்போது 'தொடங்கு' என்று சொல்லுங்கள்",
        step_template: "படி {n} / {total}",
        timer_prompt: "நீங்கள் தயாராக இருக்கும்போது 'தொடங்கு' என்று சொல்லுங்கள்.",
        next_prompt: "நீங்கள் தயாராக இருக்கும்போது 'தொடங்கு' என்று சொல்லுங்கள்.",
        completion: "வாழ்த்துகள்! நீங்கள் செய்முறையை முடித்துவிட்டீர்கள்.",
        time: TimeWords {
            minute: "நிமிடம்",
            minutes: "நிமிடங்கள்",
            second: "விநாடி",
            seconds: "விநாடிகள்",
            takes: "இந்த படி தோராயமாக எடுக்கும்",
            and: "மற்றும்",
        },
        time_increase: Some(
            "{servings} பரிமாறுதல்களுக்கு சமையல் நேரம் சுமார் {percent}% அதிகரிக்கிறது.",
        ),
        time_decrease: Some("{servings} பரிமாறுதல்களுக்கு சமையல் நேரம் சுமார் {percent}% குறைகிறது."),
    },
    Language {
        code: "es-ES",
        label: "Spanish",
        start_command: "empezar",
        say_prompt: "Di 'empezar' cuando estés listo",
        step_template: "Paso {n} de {total}",
        timer_prompt: "Di 'empezar' cuando estés listo para iniciar el temporizador.",
        next_prompt: "Di 'empezar' cuando estés listo para el siguiente paso.",
        completion: "¡Felicidades! Has completado la receta.",
        time: TimeWords {
            minute: "minuto",
            minutes: "minutos",
            second: "segundo",
            seconds: "segundos",
            takes: "Este paso toma aproximadamente",
            and: "y",
        },
        time_increase: None,
        time_decrease: None,
    },
    Language {
        code: "fr-FR",
        label: "French",
        start_command: "commencer",
        say_prompt: "Dites 'commencer' quand vous êtes prêt",
        step_template: "Étape {n} sur {total}",
        timer_prompt: "Dites 'commencer' quand vous êtes prêt à lancer le minuteur.",
        next_prompt: "Dites 'commencer' quand vous êtes prêt pour l'étape suivante.",
        completion: "Félicitations ! Vous avez terminé la recette.",
        time: TimeWords {
            minute: "minute",
            minutes: "minutes",
            second: "seconde",
            seconds: "secondes",
            takes: "Cette étape prend environ",
            and: "et",
        },
        time_increase: None,
        time_decrease: None,
    },
    Language {
        code: "de-DE",
        label: "German",
        start_command: "start",
        say_prompt: "Sagen Sie 'start', wenn Sie bereit sind",
        step_template: "Schritt {n} von {total}",
        timer_prompt: "Sagen Sie 'start', wenn Sie bereit sind, den Timer zu starten.",
        next_prompt: "Sagen Sie 'start', wenn Sie für den nächsten Schritt bereit sind.",
        completion: "Glückwunsch! Sie haben das Rezept abgeschlossen.",
        time: TimeWords {
            minute: "Minute",
            minutes: "Minuten",
            second: "Sekunde",
            seconds: "Sekunden",
            takes: "Dieser Schritt dauert ungefähr",
            and: "und",
        },
        time_increase: None,
        time_decrease: None,
    },
    Language {
        code: "ar-SA",
        label: "Arabic",
        start_command: "ابدأ",
        say_prompt: "قل 'ابدأ' عندما تكون جاهزاً",
        step_template: "الخطوة {n} من {total}",
        timer_prompt: "قل 'ابدأ' عندما تكون جاهزاً.",
        next_prompt: "قل 'ابدأ' عندما تكون جاهزاً.",
        completion: "تهانينا! لقد أكملت الوصفة.",
        time: TimeWords {
            minute: "دقيقة",
            minutes: "دقائق",
            second: "ثانية",
            seconds: "ثواني",
            takes: "تستغرق هذه الخطوة تقريباً",
            and: "و",
        },
        time_increase: None,
        time_decrease: None,
    },
];

/// Look up a language by code, falling back to [`DEFAULT_LANGUAGE`]
#[must_use]
pub fn lookup(code: &str) -> &'static Language {
    let code = code.trim();
    LANGUAGES
        .iter()
        .find(|lang| lang.code.eq_ignore_ascii_case(code))
        .unwrap_or_else(|| {
            tracing::debug!(code, fallback = DEFAULT_LANGUAGE, "unknown language code");
            default_language()
        })
}

/// The default (English) catalog entry
#[must_use]
pub fn default_language() -> &'static Language {
    &LANGUAGES[0]
}

impl Language {
    /// "Step 2 of 5" in this language (`n` is 1-based)
    #[must_use]
    pub fn step_text(&self, n: usize, total: usize) -> String {
        self.step_template
            .replace("{n}", &n.to_string())
            .replace("{total}", &total.to_string())
    }

    /// Sentence announcing how long a step takes; empty for zero seconds
    #[must_use]
    pub fn duration_text(&self, total_seconds: u32) -> String {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        let words = &self.time;

        let mut parts = Vec::with_capacity(2);
        if minutes > 0 {
            let unit = if minutes > 1 { words.minutes } else { words.minute };
            parts.push(format!("{minutes} {unit}"));
        }
        if seconds > 0 {
            let unit = if seconds > 1 { words.seconds } else { words.second };
            parts.push(format!("{seconds} {unit}"));
        }

        if parts.is_empty() {
            return String::new();
        }
        format!("{} {}.", words.takes, parts.join(&format!(" {} ", words.and)))
    }

    /// Closing prompt for a step narration
    #[must_use]
    pub const fn command_prompt(&self, has_timer: bool) -> &'static str {
        if has_timer {
            self.timer_prompt
        } else {
            self.next_prompt
        }
    }

    /// Sentence describing a cooking-time change in percent
    #[must_use]
    pub fn time_adjustment(&self, percent: i64, servings: u32) -> String {
        let template = if percent > 0 {
            self.time_increase.unwrap_or(ENGLISH_INCREASE)
        } else {
            self.time_decrease.unwrap_or(ENGLISH_DECREASE)
        };
        template
            .replace("{percent}", &percent.abs().to_string())
            .replace("{servings}", &servings.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_falls_back_to_english() {
        let lang = lookup("xx-YY");
        assert_eq!(lang.code, DEFAULT_LANGUAGE);
        assert_eq!(lang.start_command, "start");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("HI-in").code, "hi-IN");
        assert_eq!(lookup(" es-ES ").start_command, "empezar");
    }

    #[test]
    fn step_text_fills_placeholders() {
        assert_eq!(lookup("en-US").step_text(1, 2), "Step 1 of 2");
        assert_eq!(lookup("fr-FR").step_text(3, 7), "Étape 3 sur 7");
    }

    #[test]
    fn duration_text_pluralizes() {
        let en = lookup("en-US");
        assert_eq!(en.duration_text(300), "This step takes approximately 5 minutes.");
        assert_eq!(
            en.duration_text(61),
            "This step takes approximately 1 minute and 1 second."
        );
        assert_eq!(en.duration_text(45), "This step takes approximately 45 seconds.");
        assert_eq!(en.duration_text(0), "");
    }

    #[test]
    fn time_adjustment_uses_fallback_template() {
        let es = lookup("es-ES");
        assert_eq!(
            es.time_adjustment(20, 4),
            "Cooking time increases by approximately 20% for 4 servings."
        );
        let en = lookup("en-GB");
        assert_eq!(
            en.time_adjustment(-10, 1),
            "Cooking time decreases by approximately 10% for 1 servings."
        );
    }
}
