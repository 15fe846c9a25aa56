//! Language detection and voice selection for an utterance.

use serde::{Deserialize, Serialize};

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. `bn-BD`.
    pub lang: String,
    /// Engine specific identifier used to request this voice.
    pub uri: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            uri: uri.into(),
        }
    }
}

/// Language, rate and voice chosen for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtteranceSettings {
    pub lang: &'static str,
    pub rate: f32,
    /// `None` leaves the choice to the engine default for `lang`.
    pub voice: Option<Voice>,
}

/// One step of a voice fallback chain.
#[derive(Debug, Clone, Copy)]
enum VoiceRule {
    NameContains(&'static str),
    ExactLang(&'static str),
    VendorExact {
        vendor: &'static str,
        lang: &'static str,
    },
    VendorPrefix {
        vendor: &'static str,
        prefix: &'static str,
    },
    LangPrefix(&'static str),
}

impl VoiceRule {
    fn matches(&self, voice: &Voice) -> bool {
        match *self {
            VoiceRule::NameContains(name) => voice.name.contains(name),
            VoiceRule::ExactLang(lang) => voice.lang.eq_ignore_ascii_case(lang),
            VoiceRule::VendorExact { vendor, lang } => {
                voice.lang.eq_ignore_ascii_case(lang) && has_vendor(voice, vendor)
            }
            VoiceRule::VendorPrefix { vendor, prefix } => {
                has_lang_prefix(voice, prefix) && has_vendor(voice, vendor)
            }
            VoiceRule::LangPrefix(prefix) => has_lang_prefix(voice, prefix),
        }
    }
}

fn has_vendor(voice: &Voice, vendor: &str) -> bool {
    voice.name.to_lowercase().contains(vendor)
}

fn has_lang_prefix(voice: &Voice, prefix: &str) -> bool {
    voice.lang.to_ascii_lowercase().starts_with(prefix)
}

struct LanguageProfile {
    lang: &'static str,
    rate: f32,
    chain: &'static [VoiceRule],
}

// named voice > exact locale > regional variant > vendor + prefix > prefix
const BENGALI: LanguageProfile = LanguageProfile {
    lang: "bn-BD",
    rate: 0.9,
    chain: &[
        VoiceRule::NameContains("Google বাংলা"),
        VoiceRule::ExactLang("bn-BD"),
        VoiceRule::ExactLang("bn-IN"),
        VoiceRule::VendorPrefix {
            vendor: "google",
            prefix: "bn",
        },
        VoiceRule::LangPrefix("bn"),
    ],
};

const ENGLISH: LanguageProfile = LanguageProfile {
    lang: "en-US",
    rate: 1.0,
    chain: &[
        VoiceRule::VendorExact {
            vendor: "google",
            lang: "en-US",
        },
        VoiceRule::ExactLang("en-US"),
        VoiceRule::ExactLang("en-GB"),
        VoiceRule::VendorPrefix {
            vendor: "google",
            prefix: "en",
        },
        VoiceRule::LangPrefix("en"),
    ],
};

/// True when `text` contains any character of the Bengali block (U+0980..=U+09FF).
pub fn contains_bengali(text: &str) -> bool {
    text.chars().any(|c| ('\u{0980}'..='\u{09FF}').contains(&c))
}

/// Pick language, rate and the best available voice for `text`.
pub fn select_voice(text: &str, voices: &[Voice]) -> UtteranceSettings {
    let profile = if contains_bengali(text) { &BENGALI } else { &ENGLISH };

    let voice = profile
        .chain
        .iter()
        .find_map(|rule| voices.iter().find(|v| rule.matches(v)))
        .cloned();

    UtteranceSettings {
        lang: profile.lang,
        rate: profile.rate,
        voice,
    }
}
