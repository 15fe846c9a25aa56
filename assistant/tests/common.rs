//! Common utilities for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use assistant::{SessionController, Transcript, TurnSettings};
use async_trait::async_trait;
use llm_core::{Chunk, ChunkStream, Content, GenerationClient};
use tokio::sync::{broadcast, oneshot, Notify};
use tts_core::{SpeechEngine, Utterance, UtteranceOutcome, Voice};

/// One step of a scripted reply stream.
#[derive(Clone)]
pub enum Step {
    Chunk(&'static str),
    Fail(&'static str),
    /// Wait until the gate is opened.
    Wait(Arc<Notify>),
    /// Never yield again.
    Stall,
}

/// What the next `generate_streaming` call does.
#[derive(Clone)]
pub enum Reply {
    Stream(Vec<Step>),
    Refuse(&'static str),
    /// Never return a stream.
    Hang,
}

impl Reply {
    pub fn text(chunks: &[&'static str]) -> Self {
        Reply::Stream(chunks.iter().copied().map(Step::Chunk).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub prompt: String,
    pub history: Vec<Content>,
}

/// Generation client that plays back queued replies and records every call.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str, history: &[Content]) -> Reply {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            history: history.to_vec(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::text(&["ok"]))
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<String> {
        match self.record(prompt, history) {
            Reply::Stream(steps) => Ok(steps
                .iter()
                .filter_map(|s| match s {
                    Step::Chunk(text) => Some(*text),
                    _ => None,
                })
                .collect()),
            Reply::Refuse(reason) => Err(anyhow!(reason)),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn generate_streaming(&self, prompt: &str, history: &[Content]) -> Result<ChunkStream> {
        let steps = match self.record(prompt, history) {
            Reply::Stream(steps) => steps,
            Reply::Refuse(reason) => return Err(anyhow!(reason)),
            Reply::Hang => return std::future::pending().await,
        };

        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    Step::Chunk(text) => yield Ok(Chunk { text: text.to_string() }),
                    Step::Fail(reason) => {
                        yield Err(anyhow!(reason));
                        break;
                    }
                    Step::Wait(gate) => gate.notified().await,
                    Step::Stall => std::future::pending::<()>().await,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

pub fn settings() -> TurnSettings {
    TurnSettings {
        apology: TurnSettings::apology_for("support@hawlader.test"),
        ..TurnSettings::default()
    }
}

pub fn short_timeouts() -> TurnSettings {
    TurnSettings {
        response_timeout: Duration::from_millis(100),
        chunk_timeout: Duration::from_millis(100),
        ..settings()
    }
}

pub fn controller(client: Arc<ScriptedClient>) -> Arc<SessionController> {
    Arc::new(SessionController::new(client, Transcript::new(), settings()))
}

/// Speech engine that records utterances and never finishes them on its own.
pub struct RecordingEngine {
    voices: Vec<Voice>,
    pub spoken: Mutex<Vec<Utterance>>,
    pending: Mutex<Vec<oneshot::Sender<UtteranceOutcome>>>,
    voices_tx: broadcast::Sender<()>,
}

impl RecordingEngine {
    pub fn new(voices: Vec<Voice>) -> Arc<Self> {
        let (voices_tx, _) = broadcast::channel(4);
        Arc::new(Self {
            voices,
            spoken: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            voices_tx,
        })
    }
}

impl SpeechEngine for RecordingEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<oneshot::Receiver<UtteranceOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.spoken.lock().unwrap().push(utterance);
        self.pending.lock().unwrap().push(tx);
        Ok(rx)
    }

    fn cancel(&self) {
        for tx in self.pending.lock().unwrap().drain(..) {
            let _ = tx.send(UtteranceOutcome::Interrupted);
        }
    }

    fn subscribe_voices(&self) -> broadcast::Receiver<()> {
        self.voices_tx.subscribe()
    }
}
