use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use assistant::command::{Command, HELP};
use assistant::validation::parse_speak_target;
use assistant::{AssistantConfig, Message, Role, SessionController, SessionEvent, Transcript, TurnOutcome};
use llm_core::GeminiClient;
use tts_core::{EspeakEngine, PlaybackAction, PlaybackManager};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    // stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    async_main().await
}

async fn async_main() -> Result<()> {
    info!("Starting Hawlader Bank assistant...");

    let config = AssistantConfig::from_env();
    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set, replies will fail until it is configured");
    }
    info!("Using model {} at {}", config.model, config.base_url);

    let client = Arc::new(GeminiClient::new(config.gemini_settings())?);
    let controller = Arc::new(SessionController::new(
        client,
        Transcript::with_greeting(&config.greeting),
        config.turn_settings(),
    ));

    let playback = if config.speech_enabled {
        info!("Read-aloud enabled via '{}'", config.speech_program);
        let manager = PlaybackManager::new(EspeakEngine::new(config.speech_program.clone()));
        manager.watch_voices();
        Some(manager)
    } else {
        info!("Read-aloud disabled");
        None
    };

    for message in controller.snapshot().messages {
        println!("{}", format_message(&message));
    }
    println!("(type /help for commands)");

    let render = spawn_renderer(Arc::clone(&controller));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Ok(Command::Say(text)) => spawn_turn(&controller, text),
            Ok(Command::Preset(preset)) => {
                println!("you> {}", preset.prompt());
                spawn_turn(&controller, preset.prompt().to_string());
            }
            Ok(Command::Speak(arg)) => speak(&controller, playback.as_ref(), arg.as_deref()),
            Ok(Command::Stop) => {
                if let Some(playback) = &playback {
                    playback.stop();
                }
            }
            Ok(Command::History) => {
                for message in controller.snapshot().messages {
                    println!("{}", format_message(&message));
                }
            }
            Ok(Command::Metrics) => {
                println!("{}", serde_json::to_string_pretty(&controller.metrics().snapshot())?);
            }
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }

    if let Some(playback) = &playback {
        playback.shutdown();
    }
    render.abort();
    info!("Goodbye");
    Ok(())
}

/// Run a turn in the background so the prompt stays responsive; input sent
/// while a turn is pending is dropped by the controller.
fn spawn_turn(controller: &Arc<SessionController>, text: String) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let _ = controller.submit(&text).await;
    });
}

fn spawn_renderer(controller: Arc<SessionController>) -> JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("renderer skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match event {
                SessionEvent::MessageAppended(id) => {
                    // user lines are already on screen
                    if let Some(message) = controller.message(id).filter(|m| m.role == Role::Assistant) {
                        print!("\n{}", format_message(&message));
                    }
                }
                SessionEvent::ChunkAppended { text, .. } => print!("{}", text),
                SessionEvent::TurnFinished(outcome) => {
                    println!();
                    if let TurnOutcome::Failed { partial: Some(_), .. } = outcome {
                        info!("partial reply kept after failure");
                    }
                }
            }
            let _ = std::io::stdout().flush();
        }
    })
}

fn speak(controller: &SessionController, playback: Option<&PlaybackManager>, arg: Option<&str>) {
    let Some(playback) = playback else {
        println!("Read-aloud is disabled (SPEECH_ENABLED=false)");
        return;
    };

    let replies: Vec<Message> = controller
        .snapshot()
        .messages
        .into_iter()
        .filter(|m| m.role == Role::Assistant && !m.content.is_empty())
        .collect();

    let index = match parse_speak_target(arg, replies.len()) {
        Ok(index) => index,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let reply = &replies[index];

    match playback.toggle(&reply.id.to_string(), &reply.content) {
        PlaybackAction::Started(settings) => println!("(reading reply {} aloud, {})", index + 1, settings.lang),
        PlaybackAction::Stopped => println!("(stopped)"),
        PlaybackAction::Failed => println!("(speech is unavailable, see the log)"),
    }
}

fn format_message(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!(
        "[{}] {}> {}",
        message.timestamp.with_timezone(&chrono::Local).format("%H:%M"),
        who,
        message.content
    )
}
