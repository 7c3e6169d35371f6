//! Chat application module for interactive conversations with an Ollama service.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! ollamachat client library. It supports:
//!
//! - Streaming responses with real-time fragment display
//! - Switching between a local daemon, the hosted service, or any URL
//! - Slash commands for session control
//! - Configurable model, temperature, and system prompt
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Core chat session management and service interaction
//! - [`commands`]: Slash command parsing and handling

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MIN_TEMPERATURE,
};
pub use session::{ChatSession, SessionStats, interruptible};
