use tracing::warn;

use crate::error::{CommandError, SubmitRejection};

/// Prompts longer than this are still sent, but logged.
const LONG_PROMPT_CHARS: usize = 8000;

/// Validate text the user wants to send.
pub fn validate_prompt(text: &str) -> Result<(), SubmitRejection> {
    if text.trim().is_empty() {
        return Err(SubmitRejection::BlankInput);
    }
    let chars = text.chars().count();
    if chars > LONG_PROMPT_CHARS {
        warn!("Prompt is unusually long ({} characters)", chars);
    }
    Ok(())
}

/// Resolve the argument of `/speak` to an index into the speakable replies.
///
/// No argument means the latest reply; `n` is 1-based.
pub fn parse_speak_target(arg: Option<&str>, available: usize) -> Result<usize, CommandError> {
    if available == 0 {
        return Err(CommandError::NotFound("no assistant reply to read aloud yet".to_string()));
    }
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(available - 1);
    };
    let n: usize = arg
        .parse()
        .map_err(|_| CommandError::InvalidInput(format!("'{}' is not a reply number", arg)))?;
    if n == 0 || n > available {
        return Err(CommandError::NotFound(format!(
            "reply {} (there are {} replies)",
            n, available
        )));
    }
    Ok(n - 1)
}
