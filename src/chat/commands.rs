//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the service.

use crate::chat::config::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Reset the conversation to its system message.
    Clear,

    /// List the models available at the current endpoint.
    Models,

    /// Forget cached model lists and fetch again.
    Refresh,

    /// Change the model.
    Model(String),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Switch endpoint: `local`, `cloud`, or a URL.
    Endpoint(String),

    /// Set or clear the bearer credential.
    /// `None` clears the current credential.
    ApiKey(Option<String>),

    /// Set the system prompt used after the next clear.
    /// `None` restores the default instruction.
    System(Option<String>),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use ollamachat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model llama3.1:8b").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "reset" => ChatCommand::Clear,
        "models" => ChatCommand::Models,
        "refresh" => ChatCommand::Refresh,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "temperature" | "temp" => match argument {
            Some(arg) => match parse_f32_in_range(arg, MIN_TEMPERATURE, MAX_TEMPERATURE) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(err) => ChatCommand::Invalid(format!("/temperature {err}")),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        "endpoint" => match argument {
            Some(choice) => ChatCommand::Endpoint(choice.to_string()),
            None => ChatCommand::Invalid(
                "/endpoint requires 'local', 'cloud', or a URL".to_string(),
            ),
        },
        "key" => ChatCommand::ApiKey(argument.map(|s| s.to_string())),
        "system" => ChatCommand::System(argument.map(|s| s.to_string())),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

pub(crate) fn parse_f32_in_range(value: &str, min: f32, max: f32) -> Result<f32, String> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| format!("expects a value between {min} and {max}"))?;
    if parsed.is_finite() && parsed >= min && parsed <= max {
        Ok(parsed)
    } else {
        Err(format!("expects a value between {min} and {max}"))
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear the conversation
  /models                List models available at the endpoint
  /refresh               Refetch the model list
  /model <name>          Change the model (e.g., /model llama3.1:8b)
  /temperature <v>       Set temperature 0.0-1.5
  /endpoint <where>      Switch endpoint: local, cloud, or a URL
  /key [credential]      Set the API key (no argument clears it)
  /system [prompt]       Set the system prompt applied on /clear (no argument restores the default)
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}
