use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::persona::{system_instruction, SupportContact};
use crate::sse::SseDecoder;
use crate::types::{
    Chunk, Content, GenerateRequest, GenerateResponse, GenerationConfig, InstructionPart,
    SystemInstruction,
};
use crate::{ChunkStream, GenerationClient};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Longest slice of an error body echoed into the error message.
const MAX_ERROR_BODY: usize = 300;

/// Everything a call needs besides the conversation itself.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub system_instruction: String,
    pub generation: GenerationConfig,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_instruction: system_instruction(&SupportContact::default()),
            generation: GenerationConfig::default(),
        }
    }
}

/// Client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiClient {
    /// Create a new client. A missing API key is not an error here; every call
    /// made without one fails instead.
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn request_body<'a>(&'a self, prompt: &str, history: &[Content]) -> GenerateRequest<'a> {
        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.extend_from_slice(history);
        contents.push(Content::user(prompt));

        GenerateRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: [InstructionPart {
                    text: &self.settings.system_instruction,
                }],
            },
            generation_config: self.settings.generation,
        }
    }

    async fn post(&self, method: &str, body: &GenerateRequest<'_>, sse: bool) -> Result<reqwest::Response> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("GEMINI_API_KEY is not set"))?;

        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            method
        );
        debug!("POST {} with {} content entries", url, body.contents.len());

        let mut request = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body);
        if sse {
            request = request.query(&[("alt", "sse")]);
        }

        let response = request
            .send()
            .await
            .context("failed to reach the generation endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(MAX_ERROR_BODY).collect();
            bail!("generation request failed with status {status}: {excerpt}");
        }
        Ok(response)
    }
}

/// Decode one SSE payload into a chunk. A chunk without candidates carries no text.
pub(crate) fn parse_chunk(payload: &str) -> Result<Chunk> {
    let response: GenerateResponse =
        serde_json::from_str(payload).context("malformed stream chunk")?;
    if let Some(reason) = response.block_reason() {
        bail!("prompt was blocked: {reason}");
    }
    if let Some(reason) = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
    {
        debug!("stream finish reason: {reason}");
    }
    Ok(Chunk {
        text: response.text().unwrap_or_default(),
    })
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<String> {
        let body = self.request_body(prompt, history);
        let response: GenerateResponse = self
            .post("generateContent", &body, false)
            .await?
            .json()
            .await
            .context("malformed generation response")?;

        if let Some(reason) = response.block_reason() {
            bail!("prompt was blocked: {reason}");
        }
        response
            .text()
            .ok_or_else(|| anyhow!("generation response contained no candidates"))
    }

    async fn generate_streaming(&self, prompt: &str, history: &[Content]) -> Result<ChunkStream> {
        let body = self.request_body(prompt, history);
        let response = self.post("streamGenerateContent", &body, true).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut events = 0usize;
            while let Some(next) = bytes.next().await {
                let data = match next {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("generation stream interrupted: {e}");
                        yield Err(anyhow::Error::new(e).context("generation stream interrupted"));
                        return;
                    }
                };
                for payload in decoder.feed(&data) {
                    events += 1;
                    let chunk = parse_chunk(&payload);
                    let failed = chunk.is_err();
                    yield chunk;
                    if failed {
                        return;
                    }
                }
            }
            if let Some(payload) = decoder.finish() {
                yield parse_chunk(&payload);
            } else if events == 0 {
                warn!("generation stream ended without any events");
                yield Err(anyhow!("malformed stream: no events"));
            }
        };

        Ok(Box::pin(stream))
    }
}
