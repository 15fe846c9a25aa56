//! One conversation turn at a time.
//!
//! `submit` appends the user message, asks the generation client for a
//! streamed reply and grows an assistant message chunk by chunk. Failures of
//! any kind end in a single apology message. The phase returns to `Idle`
//! whenever the turn ends, including when the future is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use llm_core::{Content, GenerationClient, SupportContact};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{SubmitRejection, TurnError};
use crate::metrics::TurnMetrics;
use crate::presets::Preset;
use crate::transcript::{Message, MessageId, Role, Transcript};
use crate::validation::validate_prompt;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// User message appended, no reply chunk yet.
    AwaitingResponse,
    /// Reply message exists and is growing.
    Streaming(MessageId),
}

/// Observers re-render on these.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended(MessageId),
    ChunkAppended { id: MessageId, text: String },
    TurnFinished(TurnOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        user: MessageId,
        reply: MessageId,
    },
    Failed {
        user: MessageId,
        /// Reply that had started streaming before the failure, kept as is.
        partial: Option<MessageId>,
        apology: MessageId,
    },
}

#[derive(Debug, Clone)]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub pending: bool,
    pub phase: TurnPhase,
}

#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Bound on opening the reply stream.
    pub response_timeout: Duration,
    /// Bound on the wait for each following chunk.
    pub chunk_timeout: Duration,
    pub apology: String,
}

impl TurnSettings {
    pub fn apology_for(support_email: &str) -> String {
        format!(
            "I'm sorry, I encountered an issue. Please try again or contact support at {}.",
            support_email
        )
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(120),
            chunk_timeout: Duration::from_secs(60),
            apology: Self::apology_for(&SupportContact::default().email),
        }
    }
}

struct Session {
    transcript: Transcript,
    phase: TurnPhase,
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Freezes any in-flight reply and returns the session to `Idle` on drop.
struct PhaseGuard<'a> {
    session: &'a Mutex<Session>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let mut session = lock(self.session);
        session.transcript.finish_stream();
        session.phase = TurnPhase::Idle;
    }
}

pub struct SessionController {
    client: Arc<dyn GenerationClient>,
    session: Mutex<Session>,
    settings: TurnSettings,
    events: broadcast::Sender<SessionEvent>,
    metrics: TurnMetrics,
}

impl SessionController {
    pub fn new(client: Arc<dyn GenerationClient>, transcript: Transcript, settings: TurnSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            session: Mutex::new(Session {
                transcript,
                phase: TurnPhase::Idle,
            }),
            settings,
            events,
            metrics: TurnMetrics::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionView {
        let session = lock(&self.session);
        SessionView {
            messages: session.transcript.messages().to_vec(),
            pending: session.phase != TurnPhase::Idle,
            phase: session.phase,
        }
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        lock(&self.session).transcript.get(id).cloned()
    }

    pub fn phase(&self) -> TurnPhase {
        lock(&self.session).phase
    }

    pub fn metrics(&self) -> &TurnMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub async fn submit_preset(&self, preset: Preset) -> Result<TurnOutcome, SubmitRejection> {
        debug!("submitting preset '{}'", preset.label());
        self.submit(preset.prompt()).await
    }

    /// Run one turn. Blank input or a pending turn leaves everything untouched.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, SubmitRejection> {
        if let Err(rejection) = validate_prompt(text) {
            self.metrics.record_rejected();
            debug!("submission ignored: {}", rejection);
            return Err(rejection);
        }

        let (user, history) = {
            let mut session = lock(&self.session);
            if session.phase != TurnPhase::Idle {
                self.metrics.record_rejected();
                debug!("submission ignored: {}", SubmitRejection::TurnPending);
                return Err(SubmitRejection::TurnPending);
            }
            let history = session.transcript.history();
            let user = session.transcript.push(Role::User, text);
            session.phase = TurnPhase::AwaitingResponse;
            (user, history)
        };
        let guard = PhaseGuard {
            session: &self.session,
        };

        self.metrics.record_started();
        self.emit(SessionEvent::MessageAppended(user));
        info!("turn started ({} prior messages)", history.len());
        let started = Instant::now();

        let outcome = match self.stream_reply(text, &history).await {
            Ok(reply) => {
                let elapsed = started.elapsed().as_millis() as u64;
                self.metrics.record_completed(elapsed);
                info!("turn completed in {}ms", elapsed);
                TurnOutcome::Completed { user, reply }
            }
            Err(err) => {
                err.log();
                let (partial, apology) = {
                    let mut session = lock(&self.session);
                    let partial = session.transcript.finish_stream();
                    let apology = session
                        .transcript
                        .push(Role::Assistant, self.settings.apology.as_str());
                    (partial, apology)
                };
                self.emit(SessionEvent::MessageAppended(apology));
                self.metrics.record_failed(started.elapsed().as_millis() as u64);
                TurnOutcome::Failed {
                    user,
                    partial,
                    apology,
                }
            }
        };

        drop(guard);
        self.emit(SessionEvent::TurnFinished(outcome));
        Ok(outcome)
    }

    async fn stream_reply(&self, prompt: &str, history: &[Content]) -> Result<MessageId, TurnError> {
        let response_timeout = self.settings.response_timeout;
        let mut stream = timeout(response_timeout, self.client.generate_streaming(prompt, history))
            .await
            .map_err(|_| TurnError::Timeout(response_timeout))?
            .map_err(TurnError::Generation)?;

        let reply = {
            let mut session = lock(&self.session);
            let reply = session.transcript.begin_assistant();
            session.phase = TurnPhase::Streaming(reply);
            reply
        };
        self.emit(SessionEvent::MessageAppended(reply));

        let chunk_timeout = self.settings.chunk_timeout;
        loop {
            let next = timeout(chunk_timeout, stream.next())
                .await
                .map_err(|_| TurnError::Timeout(chunk_timeout))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(TurnError::Generation)?;
            if chunk.text.is_empty() {
                continue;
            }

            lock(&self.session).transcript.append_chunk(&chunk.text);
            self.metrics.record_chunk();
            self.emit(SessionEvent::ChunkAppended {
                id: reply,
                text: chunk.text,
            });
        }

        lock(&self.session).transcript.finish_stream();
        Ok(reply)
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use futures_util::stream;
    use llm_core::{Chunk, ChunkStream};
    use tokio::sync::Notify;

    /// Streams "a", "b" but waits for a go signal before the second chunk.
    struct GatedClient {
        go: Arc<Notify>,
        fail_open: bool,
    }

    #[async_trait]
    impl GenerationClient for GatedClient {
        async fn generate(&self, _prompt: &str, _history: &[Content]) -> Result<String> {
            Ok("ab".to_string())
        }

        async fn generate_streaming(&self, _prompt: &str, _history: &[Content]) -> Result<ChunkStream> {
            if self.fail_open {
                bail!("service unavailable");
            }
            let go = Arc::clone(&self.go);
            let chunks = stream::iter(vec![0u8, 1]).then(move |i| {
                let go = Arc::clone(&go);
                async move {
                    if i == 1 {
                        go.notified().await;
                    }
                    Ok::<_, anyhow::Error>(Chunk {
                        text: if i == 0 { "a" } else { "b" }.to_string(),
                    })
                }
            });
            Ok(Box::pin(chunks))
        }
    }

    fn controller(fail_open: bool) -> (Arc<SessionController>, Arc<Notify>) {
        let go = Arc::new(Notify::new());
        let client = GatedClient {
            go: Arc::clone(&go),
            fail_open,
        };
        let controller = SessionController::new(Arc::new(client), Transcript::new(), TurnSettings::default());
        (Arc::new(controller), go)
    }

    #[test]
    fn test_apology_names_support_email() {
        assert_eq!(
            TurnSettings::apology_for("help@example.com"),
            "I'm sorry, I encountered an issue. Please try again or contact support at help@example.com."
        );
    }

    #[tokio::test]
    async fn test_phase_moves_through_streaming_to_idle() {
        let (controller, go) = controller(false);
        let mut events = controller.subscribe();

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit("hi").await })
        };

        // user message, then the reply message
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::MessageAppended(_)));
        let SessionEvent::MessageAppended(reply) = events.recv().await.unwrap() else {
            panic!("expected the reply message");
        };
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::ChunkAppended { ref text, .. } if text == "a"
        ));
        assert_eq!(controller.phase(), TurnPhase::Streaming(reply));
        assert!(controller.snapshot().pending);

        go.notify_one();
        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { reply: r, .. } if r == reply));
        assert_eq!(controller.phase(), TurnPhase::Idle);
        assert_eq!(controller.snapshot().messages[1].content, "ab");
    }

    #[tokio::test]
    async fn test_dropped_turn_returns_to_idle() {
        let (controller, _go) = controller(false);
        let mut events = controller.subscribe();

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit("hi").await })
        };
        while !matches!(events.recv().await.unwrap(), SessionEvent::ChunkAppended { .. }) {}

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        let view = controller.snapshot();
        assert_eq!(view.phase, TurnPhase::Idle);
        assert_eq!(view.messages.last().unwrap().content, "a");
    }

    #[tokio::test]
    async fn test_open_failure_appends_apology_only() {
        let (controller, _go) = controller(true);
        let outcome = controller.submit("hi").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { partial: None, .. }));

        let view = controller.snapshot();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[1].content, TurnSettings::default().apology);
        assert_eq!(controller.metrics().snapshot().turns_failed, 1);
    }
}
