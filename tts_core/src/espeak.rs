//! `espeak-ng` backed speech engine.
//!
//! Each utterance runs as its own `espeak-ng --stdin` process. The voice
//! catalogue is read once, asynchronously, from `espeak-ng --voices`; until
//! that finishes `voices()` is empty.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::engine::{SpeechEngine, Utterance, UtteranceOutcome};
use crate::voice::Voice;

/// espeak-ng speaks 175 words per minute at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

pub struct EspeakEngine {
    program: String,
    voices: Arc<RwLock<Vec<Voice>>>,
    current: Mutex<Option<oneshot::Sender<()>>>,
    voices_tx: broadcast::Sender<()>,
}

impl EspeakEngine {
    /// Create the engine and start loading its voice list. Must be called
    /// from within a tokio runtime.
    pub fn new(program: impl Into<String>) -> Arc<Self> {
        let (voices_tx, _) = broadcast::channel(4);
        let engine = Arc::new(Self {
            program: program.into(),
            voices: Arc::new(RwLock::new(Vec::new())),
            current: Mutex::new(None),
            voices_tx,
        });
        engine.load_voices();
        engine
    }

    fn load_voices(&self) {
        let program = self.program.clone();
        let voices = Arc::clone(&self.voices);
        let notify = self.voices_tx.clone();
        tokio::spawn(async move {
            match Command::new(&program).arg("--voices").output().await {
                Ok(output) if output.status.success() => {
                    let parsed = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                    info!("loaded {} voices from {program}", parsed.len());
                    *voices.write().unwrap_or_else(PoisonError::into_inner) = parsed;
                    let _ = notify.send(());
                }
                Ok(output) => warn!("{program} --voices exited with {}", output.status),
                Err(e) => warn!("could not run {program}: {e}; speech will be unavailable"),
            }
        });
    }

    fn take_current(&self) -> Option<oneshot::Sender<()>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl SpeechEngine for EspeakEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<oneshot::Receiver<UtteranceOutcome>> {
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.uri.clone())
            .unwrap_or_else(|| primary_subtag(&utterance.lang));
        let rate = words_per_minute(utterance.rate);
        debug!("{} -v {voice} -s {rate}", self.program);

        let child = Command::new(&self.program)
            .args(["-v", voice.as_str(), "-s", rate.to_string().as_str(), "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;

        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(previous) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel_tx)
        {
            let _ = previous.send(());
        }

        tokio::spawn(async move {
            let outcome = run_utterance(child, utterance.text, cancel_rx).await;
            let _ = done_tx.send(outcome);
        });
        Ok(done_rx)
    }

    fn cancel(&self) {
        if let Some(cancel) = self.take_current() {
            let _ = cancel.send(());
        }
    }

    fn subscribe_voices(&self) -> broadcast::Receiver<()> {
        self.voices_tx.subscribe()
    }
}

async fn run_utterance(
    mut child: Child,
    text: String,
    mut cancel: oneshot::Receiver<()>,
) -> UtteranceOutcome {
    let stdin = child.stdin.take();
    let speak = async {
        if let Some(mut stdin) = stdin {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| format!("failed to send text: {e}"))?;
            // EOF lets espeak-ng finish
            drop(stdin);
        }
        match child.wait().await {
            Ok(status) if status.success() => Ok::<(), String>(()),
            Ok(status) => Err(format!("exited with {status}")),
            Err(e) => Err(e.to_string()),
        }
    };

    let result = tokio::select! {
        result = speak => Some(result),
        _ = &mut cancel => None,
    };

    match result {
        Some(Ok(())) => UtteranceOutcome::Finished,
        Some(Err(reason)) => {
            let _ = child.kill().await;
            UtteranceOutcome::Failed(reason)
        }
        None => {
            let _ = child.kill().await;
            UtteranceOutcome::Interrupted
        }
    }
}

fn words_per_minute(rate: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * rate).round().clamp(80.0, 450.0) as u32
}

fn primary_subtag(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or(lang)
        .to_ascii_lowercase()
}

/// `en-us` → `en-US`, `bn_bd` → `bn-BD`; private-use subtags are left lowercase.
pub fn normalize_tag(tag: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut private = false;
    for (i, part) in tag.split(['-', '_']).enumerate() {
        if i == 0 {
            out.push(part.to_ascii_lowercase());
            continue;
        }
        if part.eq_ignore_ascii_case("x") {
            private = true;
        }
        if !private && part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
            out.push(part.to_ascii_uppercase());
        } else {
            out.push(part.to_ascii_lowercase());
        }
    }
    out.join("-")
}

/// Parse the table printed by `espeak-ng --voices`.
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 || fields[0] == "Pty" {
                return None;
            }
            Some(Voice::new(
                fields[3].replace('_', " "),
                normalize_tag(fields[1]),
                fields[4],
            ))
        })
        .collect()
}
