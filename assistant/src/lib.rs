//! Hawlader Bank support assistant: a streaming chat session whose replies
//! can be read aloud.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod presets;
pub mod transcript;
pub mod validation;

pub use config::AssistantConfig;
pub use controller::{SessionController, SessionEvent, SessionView, TurnOutcome, TurnPhase, TurnSettings};
pub use error::{CommandError, SubmitRejection, TurnError};
pub use presets::Preset;
pub use transcript::{Message, MessageId, Role, Transcript};
