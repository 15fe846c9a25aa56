use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

/// Why `submit` did nothing. Not shown to the user as an error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    #[error("input is blank")]
    BlankInput,

    #[error("a turn is already in progress")]
    TurnPending,
}

/// Failure of one turn. Always recovered by the apology message.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("no response from the generation service within {0:?}")]
    Timeout(Duration),

    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
}

impl TurnError {
    pub fn log(&self) {
        match self {
            TurnError::Timeout(_) => warn!("{}", self),
            TurnError::Generation(_) => error!("{}", self),
        }
    }
}

/// Problems with a line typed into the terminal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown command: /{0}")]
    UnknownCommand(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
