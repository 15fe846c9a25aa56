//! Read assistant replies aloud.
//!
//! [`PlaybackManager`] decides *what* to say and in which language and voice;
//! a [`SpeechEngine`] does the actual talking. [`EspeakEngine`] drives the
//! `espeak-ng` program, tests plug in their own engine.

mod engine;
mod espeak;
mod playback;
mod text;
mod voice;

pub use engine::{SpeechEngine, Utterance, UtteranceOutcome};
pub use espeak::{normalize_tag, parse_voice_list, EspeakEngine};
pub use playback::{PlaybackAction, PlaybackManager, PlaybackState};
pub use text::clean_for_speech;
pub use voice::{contains_bengali, select_voice, UtteranceSettings, Voice};
