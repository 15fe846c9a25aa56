//! Remote text generation for the support assistant.
//!
//! Two calls are offered: a one-shot [`GenerationClient::generate`] and an
//! incremental [`GenerationClient::generate_streaming`]. Both attach the
//! same system instruction and sampling parameters. Failures of any kind
//! (missing key, transport, bad status, malformed payload) come back as a
//! plain `anyhow::Error`; callers are not expected to tell them apart.

mod gemini;
pub mod persona;
pub mod sse;
mod types;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

pub use gemini::{GeminiClient, GeminiSettings, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use persona::SupportContact;
pub use types::{Chunk, Content, ContentRole, GenerationConfig, Part};

/// Lazy, single-use sequence of reply chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk>> + Send>>;

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send the prompt after `history` and return the complete reply.
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<String>;

    /// Send the prompt after `history` and return the reply as it is produced.
    async fn generate_streaming(&self, prompt: &str, history: &[Content]) -> Result<ChunkStream>;
}
