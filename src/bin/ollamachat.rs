//! Interactive chat application for conversing with Ollama models.
//!
//! This binary provides a streaming REPL interface for chatting with models
//! served by a local Ollama daemon, the hosted service, or any compatible URL.
//!
//! # Usage
//!
//! ```bash
//! # Hosted service, key from OLLAMA_API_KEY
//! ollamachat
//!
//! # Local daemon with a specific model
//! ollamachat --endpoint local --model llama3.1
//!
//! # Set a system prompt and a temperature
//! ollamachat --system "You are a helpful coding assistant" --temperature 0.7
//!
//! # Disable colors (useful for piping output)
//! ollamachat --no-color
//! ```
//!
//! Set `OLLAMACHAT_LOG` (e.g. `OLLAMACHAT_LOG=debug`) to see diagnostics on stderr.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/models` - List models at the endpoint
//! - `/model <name>` - Change the model
//! - `/endpoint <where>` - Switch endpoint
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use ollamachat::Endpoint;
use ollamachat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    interruptible, parse_command,
};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "OLLAMACHAT_LOG";

/// Main entry point for the ollamachat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("ollamachat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let use_color = config.use_color;

    let mut session = ChatSession::new(config)?;
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer = PlainTextRenderer::with_color(use_color).with_interrupt(interrupted.clone());

    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    // From here on Ctrl+C only sets the flag.
    let Some(model) = interruptible(&renderer, session.ensure_model()).await else {
        println!("Goodbye!");
        return Ok(());
    };
    println!("Ollama Chat");
    print_caption(&session, model.as_deref());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Models => {
                            match interruptible(&renderer, session.models()).await {
                                Some(models) => print_models(&session, &models),
                                None => renderer.print_interrupted(),
                            }
                        }
                        ChatCommand::Refresh => {
                            match interruptible(&renderer, session.refresh_models()).await {
                                Some(models) => print_models(&session, &models),
                                None => renderer.print_interrupted(),
                            }
                        }
                        ChatCommand::Model(model) => {
                            session.set_model(model.clone());
                            renderer.print_info(&format!("Model changed to: {model}"));
                        }
                        ChatCommand::Temperature(value) => match session.set_temperature(value) {
                            Ok(()) => renderer.print_info(&format!("temperature set to {value:.2}")),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Endpoint(choice) => {
                            let api_key = session.endpoint().api_key().map(String::from);
                            let switched = Endpoint::from_choice(&choice)
                                .and_then(|endpoint| session.set_endpoint(endpoint.with_api_key(api_key)));
                            match switched {
                                Ok(()) => {
                                    renderer.print_info(&format!(
                                        "Endpoint changed to: {}",
                                        session.endpoint()
                                    ));
                                    warn_if_model_missing(&mut session, &mut renderer).await;
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::ApiKey(api_key) => {
                            let clearing = api_key.is_none();
                            match session.set_api_key(api_key) {
                                Ok(()) if clearing => renderer.print_info("API key cleared."),
                                Ok(()) => renderer.print_info("API key set."),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::System(prompt) => {
                            session.set_system_prompt(prompt.clone());
                            match prompt {
                                Some(p) => renderer.print_info(&format!(
                                    "System prompt set to: {p} (applies after /clear)"
                                )),
                                None => renderer
                                    .print_info("System prompt restored to default (applies after /clear)."),
                            }
                        }
                        ChatCommand::Stats => {
                            print_stats(&session);
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&session);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                println!("Assistant:");
                if let Err(e) = session.send_streaming(line, &mut renderer).await
                    && !e.is_abort()
                {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

async fn warn_if_model_missing(session: &mut ChatSession, renderer: &mut PlainTextRenderer) {
    let Some(models) = interruptible(&*renderer, session.models()).await else {
        renderer.print_interrupted();
        return;
    };
    if let Some(model) = session.model()
        && !models.iter().any(|m| m == model)
    {
        renderer.print_warning(&format!(
            "{model} is not listed at {}; use /models to pick another",
            session.endpoint()
        ));
    }
}

fn print_caption(session: &ChatSession, model: Option<&str>) {
    println!(
        "Endpoint: {} • Model: {}",
        session.endpoint(),
        model.unwrap_or("(none)")
    );
}

fn print_models(session: &ChatSession, models: &[String]) {
    println!("    Models at {}:", session.endpoint());
    for model in models {
        let marker = if session.model() == Some(model.as_str()) {
            "*"
        } else {
            " "
        };
        println!("    {marker} {model}");
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Endpoint: {}", stats.endpoint);
    println!("      Model: {}", stats.model.as_deref().unwrap_or("(none)"));
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Turns: {} completed / {} failed",
        stats.turns_completed, stats.turns_failed
    );
    println!("      Fragments received: {}", stats.fragments_received);
    match stats.cached_models {
        Some(count) => println!("      Cached models: {count}"),
        None => println!("      Cached models: (none)"),
    }
}

fn print_config(session: &ChatSession) {
    let stats = session.stats();
    println!("    Current Configuration:");
    println!("      Endpoint: {}", stats.endpoint);
    println!(
        "      API key: {}",
        if stats.endpoint.api_key().is_some() {
            "set"
        } else {
            "(none)"
        }
    );
    println!("      Model: {}", stats.model.as_deref().unwrap_or("(none)"));
    println!("      Temperature: {:.2}", stats.temperature);
    println!("      System prompt: {}", stats.system_prompt);
    println!(
        "      Colors: {}",
        if session.use_color() { "on" } else { "off" }
    );
}
