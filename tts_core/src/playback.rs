//! Read assistant messages aloud, one at a time.
//!
//! The manager owns the only piece of shared playback state: which message,
//! if any, is being spoken. Every utterance gets a token; completion
//! notifications carry it, so a late "ended" from an utterance that was
//! already replaced can never clear the marker of its successor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast::error::RecvError, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::{SpeechEngine, Utterance, UtteranceOutcome};
use crate::text::clean_for_speech;
use crate::voice::{select_voice, UtteranceSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking { message_id: String, utterance: u64 },
}

/// What a `toggle` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    Started(UtteranceSettings),
    Stopped,
    /// The engine refused the utterance; nothing is playing.
    Failed,
}

struct Inner {
    state: PlaybackState,
    next_utterance: u64,
    voices_task: Option<JoinHandle<()>>,
}

pub struct PlaybackManager {
    engine: Arc<dyn SpeechEngine>,
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlaybackManager {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            inner: Arc::new(Mutex::new(Inner {
                state: PlaybackState::Idle,
                next_utterance: 0,
                voices_task: None,
            })),
        }
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.inner).state.clone()
    }

    /// Id of the message being read aloud.
    pub fn active(&self) -> Option<String> {
        match &lock(&self.inner).state {
            PlaybackState::Speaking { message_id, .. } => Some(message_id.clone()),
            PlaybackState::Idle => None,
        }
    }

    /// Stop `message_id` if it is playing, otherwise replace whatever plays with it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn toggle(&self, message_id: &str, text: &str) -> PlaybackAction {
        let mut inner = lock(&self.inner);

        if let PlaybackState::Speaking { message_id: active, .. } = &inner.state {
            let same = active == message_id;
            self.engine.cancel();
            inner.state = PlaybackState::Idle;
            if same {
                info!("stopped speech for message {message_id}");
                return PlaybackAction::Stopped;
            }
        }

        let settings = select_voice(text, &self.engine.voices());
        let utterance = Utterance {
            text: clean_for_speech(text),
            lang: settings.lang.to_string(),
            rate: settings.rate,
            voice: settings.voice.clone(),
        };

        inner.next_utterance += 1;
        let token = inner.next_utterance;
        inner.state = PlaybackState::Speaking {
            message_id: message_id.to_string(),
            utterance: token,
        };

        match self.engine.speak(utterance) {
            Ok(done) => {
                info!(
                    "speaking message {message_id} as {} (voice: {})",
                    settings.lang,
                    settings.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default")
                );
                self.watch_utterance(done, token);
                PlaybackAction::Started(settings)
            }
            Err(e) => {
                error!("speech engine refused message {message_id}: {e:#}");
                inner.state = PlaybackState::Idle;
                PlaybackAction::Failed
            }
        }
    }

    /// Stop any active playback.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        if inner.state != PlaybackState::Idle {
            self.engine.cancel();
            inner.state = PlaybackState::Idle;
        }
    }

    /// Log voice catalogue updates until `shutdown`.
    pub fn watch_voices(&self) {
        let mut updates = self.engine.subscribe_voices();
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        debug!("system voices updated: {} available", engine.voices().len());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = lock(&self.inner).voices_task.replace(task) {
            previous.abort();
        }
    }

    /// Cancel playback and release the voice listener.
    pub fn shutdown(&self) {
        let mut inner = lock(&self.inner);
        self.engine.cancel();
        inner.state = PlaybackState::Idle;
        if let Some(task) = inner.voices_task.take() {
            task.abort();
        }
    }

    fn watch_utterance(&self, done: oneshot::Receiver<UtteranceOutcome>, token: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = done
                .await
                .unwrap_or_else(|_| UtteranceOutcome::Failed("engine dropped the utterance".into()));
            match &outcome {
                UtteranceOutcome::Failed(reason) => error!("speech synthesis error: {reason}"),
                other => debug!("utterance {token} ended: {other:?}"),
            }

            let mut inner = lock(&inner);
            if matches!(inner.state, PlaybackState::Speaking { utterance, .. } if utterance == token) {
                inner.state = PlaybackState::Idle;
            }
        });
    }
}
