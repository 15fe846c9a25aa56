//! Boundary to the platform speech engine.

use anyhow::Result;
use tokio::sync::{broadcast, oneshot};

use crate::voice::Voice;

/// Everything the engine needs to start speaking.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub voice: Option<Voice>,
}

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Finished,
    /// Stopped by `cancel` before it finished.
    Interrupted,
    Failed(String),
}

/// A speech engine that plays at most what it is told and reports back per utterance.
pub trait SpeechEngine: Send + Sync + 'static {
    /// Voices known right now. May be empty until the catalogue has loaded.
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking. The receiver resolves once the utterance ends, is
    /// interrupted, or fails.
    fn speak(&self, utterance: Utterance) -> Result<oneshot::Receiver<UtteranceOutcome>>;

    /// Stop anything currently playing.
    fn cancel(&self);

    /// Notified whenever the voice catalogue changes.
    fn subscribe_voices(&self) -> broadcast::Receiver<()>;
}
