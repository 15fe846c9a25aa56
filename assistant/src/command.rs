use crate::error::CommandError;
use crate::presets::Preset;

/// A line typed into the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the assistant.
    Say(String),
    Preset(Preset),
    /// Toggle read-aloud of a reply; `None` means the latest one.
    Speak(Option<String>),
    Stop,
    History,
    Metrics,
    Help,
    Quit,
}

pub const HELP: &str = "\
Type a message and press Enter to ask the assistant.

  /preset <name>   send a canned prompt (support, golpu, faq, account, loan, joke)
  /speak [n]       read reply n aloud, or the latest; again to stop
  /stop            stop reading aloud
  /history         show the conversation
  /metrics         show turn statistics
  /help            show this help
  /quit            leave";

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        match name.to_ascii_lowercase().as_str() {
            "preset" | "p" => {
                let arg = arg.ok_or_else(|| {
                    CommandError::InvalidInput("/preset needs a name, see /help".to_string())
                })?;
                Preset::from_command(arg)
                    .map(Command::Preset)
                    .ok_or_else(|| CommandError::NotFound(format!("preset '{}'", arg)))
            }
            "speak" | "s" => Ok(Command::Speak(arg.map(str::to_string))),
            "stop" => Ok(Command::Stop),
            "history" | "h" => Ok(Command::History),
            "metrics" => Ok(Command::Metrics),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}
