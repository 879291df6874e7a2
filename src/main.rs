use anyhow::{Context, Result};
use clap::Parser;
use colloquy::integration::{notification_channel, ChatSession, Notification, SessionConfig};
use colloquy::llm::{DryRunBackend, GenerationClient, TemplatedClient};
use colloquy::speech::{Platform, VoiceSelection};
use colloquy::{SubmitOutcome, Tone, Turn};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /tone [name]        show or set the reply tone
  /voice on|off       turn spoken replies on or off
  /voices             list available voices
  /use <n|default>    select a voice from /voices
  /mic                toggle listening
  /export             print the transcript as JSON
  /help               show this help
  /quit               leave
Anything else is sent as a message.";

#[derive(Parser, Debug)]
#[command(name = "colloquy", about = "Conversational chat with spoken replies")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial reply tone
    #[arg(long)]
    tone: Option<Tone>,

    /// Speak replies aloud
    #[arg(long)]
    voice_reply: bool,

    /// Start with an empty transcript
    #[arg(long)]
    no_greeting: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquy=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting Colloquy");

    let client: Arc<dyn GenerationClient> = match &config.prompt_template {
        Some(template) => Arc::new(
            TemplatedClient::with_template(template.clone(), DryRunBackend)
                .context("Invalid prompt template")?,
        ),
        None => Arc::new(TemplatedClient::new(DryRunBackend)),
    };

    let (notifier, notifications) = notification_channel();
    let session = ChatSession::new(config, Platform::headless(), client, Arc::new(notifier));

    for turn in session.transcript() {
        print_turn(&turn);
    }
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let keep_going = match line.strip_prefix('/') {
            Some(command) => run_command(&session, command),
            None => {
                send(&session, line).await;
                true
            }
        };
        print_notifications(&notifications);
        if !keep_going {
            break;
        }
    }

    session.teardown();
    info!("Colloquy shutting down");
    Ok(())
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => match SessionConfig::default_path() {
            Some(path) => SessionConfig::load_or_default(path)?,
            None => SessionConfig::default(),
        },
    };

    if let Some(tone) = args.tone {
        config = config.with_tone(tone);
    }
    if args.voice_reply {
        config = config.with_voice_reply(true);
    }
    if args.no_greeting {
        config = config.without_greeting();
    }
    Ok(config)
}

async fn send(session: &ChatSession, text: &str) {
    match session.submit(text).await {
        SubmitOutcome::Replied(turn) | SubmitOutcome::FellBack(turn) => print_turn(&turn),
        SubmitOutcome::Rejected(reason) => tracing::debug!("Submit rejected: {:?}", reason),
    }
}

/// Returns `false` when the user asked to quit
fn run_command(session: &ChatSession, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (name, arg) {
        ("quit" | "exit", _) => return false,
        ("help", _) => println!("{}", HELP),
        ("tone", None) => {
            let names: Vec<&str> = Tone::ALL.iter().map(Tone::as_str).collect();
            println!("Tone: {} (available: {})", session.tone(), names.join(", "));
        }
        ("tone", Some(value)) => match value.parse::<Tone>() {
            Ok(tone) => {
                session.set_tone(tone);
                println!("Tone set to {}", tone.label());
            }
            Err(e) => println!("{}", e),
        },
        ("voice", Some("on")) => session.set_voice_reply_enabled(true),
        ("voice", Some("off")) => session.set_voice_reply_enabled(false),
        ("voice", _) => println!(
            "Voice reply is {}",
            if session.voice_reply_enabled() { "on" } else { "off" }
        ),
        ("voices", _) => {
            let selected = session.selected_voice();
            for (i, option) in session.voice_options().iter().enumerate() {
                let current = match &option.selection {
                    VoiceSelection::PlatformDefault => selected.is_none(),
                    VoiceSelection::Voice(uri) => selected.as_deref() == Some(uri.as_str()),
                };
                let marker = if current { "*" } else { " " };
                println!("{} {:>2}. {}", marker, i, option.label);
            }
        }
        ("use", Some("default")) => session.select_voice(VoiceSelection::PlatformDefault),
        ("use", Some(index)) => {
            let options = session.voice_options();
            match index.parse::<usize>().ok().and_then(|i| options.get(i)) {
                Some(option) => {
                    session.select_voice(option.selection.clone());
                    println!("Voice: {}", option.label);
                }
                None => println!("No voice {}; see /voices", index),
            }
        }
        ("mic", _) => {
            let outcome = session.toggle_listening();
            tracing::debug!("Toggle listening: {:?}", outcome);
            println!("Microphone: {}", session.microphone_status().label());
        }
        ("export", _) => match serde_json::to_string_pretty(&session.transcript()) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("Export failed: {}", e),
        },
        _ => println!("Unknown command /{}; type /help", name),
    }
    true
}

fn print_turn(turn: &Turn) {
    let who = if turn.sender().is_user() { "You" } else { "Assistant" };
    println!("[{}] {}: {}", turn.display_time(), who, turn.text());
}

fn print_notifications(rx: &Receiver<Notification>) {
    for notification in rx.try_iter() {
        println!("! {}: {}", notification.title, notification.description);
    }
}
