// Configuration for the assistant, read from the environment

use std::str::FromStr;
use std::time::Duration;

use llm_core::{
    persona::{self, SupportContact},
    GeminiSettings, GenerationConfig, DEFAULT_BASE_URL, DEFAULT_MODEL,
};

use crate::controller::TurnSettings;

#[derive(Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub llm_timeout_secs: u64,
    pub chunk_timeout_secs: u64,
    pub support_email: String,
    pub support_phone: String,
    pub greeting: String,
    pub speech_enabled: bool,
    pub speech_program: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let contact = SupportContact::default();
        let sampling = GenerationConfig::default();
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
            llm_timeout_secs: 120,
            chunk_timeout_secs: 60,
            support_email: contact.email,
            support_phone: contact.phone,
            greeting: persona::GREETING.to_string(),
            speech_enabled: true,
            speech_program: "espeak-ng".to_string(),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = text("GEMINI_API_KEY").or_else(|| text("API_KEY"));

        let speech_enabled = lookup("SPEECH_ENABLED")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.speech_enabled);

        Self {
            api_key,
            model: text("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: text("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            temperature: parsed(&lookup, "LLM_TEMPERATURE").unwrap_or(defaults.temperature),
            top_p: parsed(&lookup, "LLM_TOP_P").unwrap_or(defaults.top_p),
            top_k: parsed(&lookup, "LLM_TOP_K").unwrap_or(defaults.top_k),
            llm_timeout_secs: parsed(&lookup, "LLM_TIMEOUT_SECS").unwrap_or(defaults.llm_timeout_secs),
            chunk_timeout_secs: parsed(&lookup, "LLM_CHUNK_TIMEOUT_SECS").unwrap_or(defaults.chunk_timeout_secs),
            support_email: text("SUPPORT_EMAIL").unwrap_or(defaults.support_email),
            support_phone: text("SUPPORT_PHONE").unwrap_or(defaults.support_phone),
            // an empty greeting is meaningful: it disables the greeting
            greeting: lookup("ASSISTANT_GREETING").unwrap_or(defaults.greeting),
            speech_enabled,
            speech_program: text("SPEECH_PROGRAM").unwrap_or(defaults.speech_program),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn support_contact(&self) -> SupportContact {
        SupportContact {
            email: self.support_email.clone(),
            phone: self.support_phone.clone(),
        }
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            system_instruction: persona::system_instruction(&self.support_contact()),
            generation: GenerationConfig {
                temperature: self.temperature,
                top_p: self.top_p,
                top_k: self.top_k,
            },
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            response_timeout: self.llm_timeout(),
            chunk_timeout: self.chunk_timeout(),
            apology: TurnSettings::apology_for(&self.support_email),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
