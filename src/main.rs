use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cookalong::feedback::AXES;
use cookalong::recipe::normalize;
use cookalong::session::CookingSession;
use cookalong::speech::{
    CloudVoice, ConsoleSynthesizer, NarrationEvent, SpeechBackend, SpeechOptions, SpeechOutput,
    TextToSpeech,
};
use cookalong::{
    Config, JsonlRatingStore, Phase, SessionSnapshot, TypedRecognizer, UserCommand, language,
    scaler,
};

/// Cookalong - hands-free, voice-guided cooking
#[derive(Parser)]
#[command(name = "cookalong", version, about)]
struct Cli {
    /// Config file (default: <config dir>/cookalong/config.toml)
    #[arg(short, long, env = "COOKALONG_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cook a recipe step by step
    Cook {
        /// Recipe JSON, canonical or raw generator output
        recipe: PathBuf,
        /// Target servings
        #[arg(short, long)]
        servings: Option<u32>,
        /// Narration language, e.g. "hi-IN"
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Print a recipe scaled to a number of servings
    Scale {
        recipe: PathBuf,
        servings: u32,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// List supported languages
    Languages,
    /// Show the taste profile built from past ratings
    Profile,
    /// Print a recipe prompt biased by the taste profile
    Prompt {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Speak a line through the configured voice
    Say {
        #[arg(default_value = "Hello! This is a test of the cooking voice.")]
        text: String,
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,cookalong=info",
        1 => "info,cookalong=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config.language, ?config.servings, "loaded configuration");

    match cli.command {
        Command::Cook {
            recipe,
            servings,
            language,
        } => cook(&config, &recipe, servings, language.as_deref()).await,
        Command::Scale {
            recipe,
            servings,
            language,
        } => scale(&config, &recipe, servings, language.as_deref()),
        Command::Languages => {
            list_languages();
            Ok(())
        }
        Command::Profile => profile(&config),
        Command::Prompt { text } => prompt(&config, &text.join(" ")),
        Command::Say { text, language } => say(&config, &text, language.as_deref()).await,
    }
}

fn load_recipe(path: &Path) -> anyhow::Result<cookalong::Recipe> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    Ok(normalize::parse_recipe_text(&text)?)
}

/// Cloud voice when configured; any problem falls back to the local synthesizer
fn cloud_voice(config: &Config) -> Option<Box<dyn SpeechBackend>> {
    match TextToSpeech::from_config(&config.speech, config.cloud_api_key()) {
        Ok(Some(tts)) => Some(Box::new(CloudVoice::new(tts))),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "cloud voice unavailable, using local synthesizer");
            None
        }
    }
}

/// One line of terminal input during a session
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(UserCommand),
    /// Spoken words, typed
    Transcript(String),
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Transcript(line.to_string()));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default().to_lowercase();
    let command = match name.as_str() {
        "start" => UserCommand::Start,
        "skip" => UserCommand::Skip,
        "stop" => UserCommand::Stop,
        "restart" => UserCommand::Restart,
        "timer" => UserCommand::RestartTimer,
        "dismiss" => UserCommand::DismissNotice,
        "norate" => UserCommand::DeclineRating,
        "servings" => {
            let servings = words
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or("usage: /servings <n>")?;
            UserCommand::Servings(servings)
        }
        "rate" => {
            let mut axes = [0u8; 6];
            for axis in &mut axes {
                *axis = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| format!("usage: /rate {} [notes]", AXES.join(" ")))?;
            }
            UserCommand::Rate {
                axes,
                notes: words.collect::<Vec<_>>().join(" "),
            }
        }
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" => return Ok(Input::Quit),
        other => return Err(format!("unknown command /{other}, try /help")),
    };
    Ok(Input::Command(command))
}

fn print_help() {
    println!("Type what you would say (e.g. \"start\"), or use:");
    println!("  /start /skip /stop /restart /timer /dismiss /servings <n>");
    println!("  /rate {} [notes]   /norate   /quit", AXES.join(" "));
}

fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn render(previous: &SessionSnapshot, next: &SessionSnapshot) {
    if next.notice != previous.notice
        && let Some(notice) = &next.notice
    {
        println!("⚠ {notice}");
    }

    if next.phase != previous.phase {
        match next.phase {
            Phase::WaitingForStart if next.listener_active => {
                println!("🎤 listening... (type \"start\" or /start)");
            }
            Phase::WaitingForStart => println!("⏸ waiting (/start to continue)"),
            Phase::TimerRunning => {
                println!("⏱ timer started: {}", format_clock(next.remaining_seconds));
            }
            Phase::Complete if next.rating_pending => {
                println!("⭐ rate this dish: /rate {} [notes], or /norate", AXES.join(" "));
            }
            Phase::Idle => println!("■ stopped"),
            Phase::Speaking | Phase::Complete => {}
        }
    } else if next.phase == Phase::TimerRunning
        && next.remaining_seconds != previous.remaining_seconds
        && (next.remaining_seconds % 30 == 0 || next.remaining_seconds <= 5)
    {
        println!("⏱ {} remaining", format_clock(next.remaining_seconds));
    }
}

async fn cook(
    config: &Config,
    path: &Path,
    servings: Option<u32>,
    language: Option<&str>,
) -> anyhow::Result<()> {
    let recipe = load_recipe(path)?;

    let recognizer = TypedRecognizer::new();
    let typed = recognizer.input();

    let mut builder = CookingSession::builder(recipe)
        .config(config)
        .platform_voice(Box::new(ConsoleSynthesizer::stdout(&config.speech)))
        .recognizer(Box::new(recognizer))
        .feedback(Box::new(JsonlRatingStore::new(config.feedback_path.clone())));
    if let Some(servings) = servings {
        builder = builder.servings(servings);
    }
    if let Some(code) = language {
        builder = builder.language(code);
    }
    if let Some(cloud) = cloud_voice(config) {
        builder = builder.cloud_voice(cloud);
    }
    let mut session = builder.build();

    let scaled = session.scaled();
    println!("🍳 {} ({} servings)", scaled.recipe.title, scaled.target_servings);
    for ingredient in &scaled.recipe.ingredients {
        println!("  • {ingredient}");
    }
    let adjustment = session.time_adjustment();
    if !adjustment.is_empty() {
        println!("{adjustment}");
    }
    print_help();

    let (lines_tx, mut lines) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if lines_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut snapshots = session.subscribe();
    let mut shown = snapshots.borrow_and_update().clone();
    session.dispatch(UserCommand::Start)?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => print_help(),
                    Ok(Input::Transcript(text)) if text.is_empty() => {}
                    Ok(Input::Transcript(text)) => {
                        if !typed.submit(&text) {
                            println!("(not listening right now; use /start)");
                        }
                    }
                    Ok(Input::Command(command)) => {
                        if let Err(e) = session.dispatch(command) {
                            println!("✗ {e}");
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            Some(signal) = session.next_signal() => {
                if let Err(e) = session.handle_signal(signal) {
                    println!("✗ {e}");
                }
            }
            Ok(()) = snapshots.changed() => {
                let next = snapshots.borrow_and_update().clone();
                render(&shown, &next);
                shown = next;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn scale(config: &Config, path: &Path, servings: u32, language: Option<&str>) -> anyhow::Result<()> {
    let recipe = load_recipe(path)?;
    let language = language::lookup(language.unwrap_or(&config.language));
    let scaled = scaler::scale(&recipe, servings);

    println!("{}", serde_json::to_string_pretty(&scaled)?);
    let adjustment =
        scaler::time_adjustment_text(recipe.base_servings(), scaled.target_servings, language);
    if !adjustment.is_empty() {
        println!("{adjustment}");
    }
    Ok(())
}

fn list_languages() {
    for lang in language::LANGUAGES {
        println!("{:<6} {:<24} say \"{}\"", lang.code, lang.label, lang.start_command);
    }
}

fn profile(config: &Config) -> anyhow::Result<()> {
    let store = JsonlRatingStore::new(config.feedback_path.clone());
    let profile = store.profile()?;
    if profile.ratings == 0 {
        println!("No ratings yet ({})", store.path().display());
        return Ok(());
    }

    println!("Taste profile from {} ratings:", profile.ratings);
    for (name, value) in AXES.iter().zip(profile.axes()) {
        println!("  {name:<7} {value:.1}");
    }
    Ok(())
}

fn prompt(config: &Config, text: &str) -> anyhow::Result<()> {
    let profile = JsonlRatingStore::new(config.feedback_path.clone()).profile()?;
    println!("{}", profile.enhance_prompt(text));
    Ok(())
}

async fn say(config: &Config, text: &str, language: Option<&str>) -> anyhow::Result<()> {
    let language = language::lookup(language.unwrap_or(&config.language));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut output = SpeechOutput::new(
        Box::new(ConsoleSynthesizer::stdout(&config.speech)),
        tx,
        SpeechOptions::from(&config.speech),
    );
    if let Some(cloud) = cloud_voice(config) {
        output = output.with_cloud(cloud);
    }

    let id = output.speak(text, language.code)?;
    while let Some(signal) = rx.recv().await {
        match output.on_signal(signal) {
            Some(NarrationEvent::Ended(done)) if done == id => return Ok(()),
            Some(NarrationEvent::Failed(_, reason)) => anyhow::bail!("narration failed: {reason}"),
            _ => {}
        }
    }
    Ok(())
}
