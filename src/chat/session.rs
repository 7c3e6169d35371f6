//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation,
//! the model catalog, and the client, and drives one streaming turn at a time.

use std::time::Duration;

use futures::StreamExt;

use crate::catalog::ModelCatalog;
use crate::chat::config::{ChatConfig, MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::client::Ollama;
use crate::conversation::{Conversation, DEFAULT_SYSTEM_PROMPT};
use crate::error::{Error, Result};
use crate::observability::{SESSION_FAILED_TURNS, SESSION_TURNS};
use crate::render::Renderer;
use crate::transport::Endpoint;

/// How often a blocked stream read wakes up to check for a user interrupt.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// A chat session that manages conversation state and service interactions.
///
/// At most one turn is in flight at a time: [`send_streaming`](Self::send_streaming) takes the
/// session mutably for the whole turn.
pub struct ChatSession {
    client: Ollama,
    catalog: ModelCatalog,
    conversation: Conversation,
    config: ChatConfig,
    turns_completed: u64,
    turns_failed: u64,
    fragments_received: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The endpoint in use.
    pub endpoint: Endpoint,
    /// The selected model, if any.
    pub model: Option<String>,
    /// The sampling temperature.
    pub temperature: f32,
    /// The system prompt applied on reset.
    pub system_prompt: String,
    /// The number of messages in the conversation, including the system message.
    pub message_count: usize,
    /// Turns whose reply was committed to the conversation.
    pub turns_completed: u64,
    /// Turns that failed or were interrupted.
    pub turns_failed: u64,
    /// Fragments received across all turns.
    pub fragments_received: u64,
    /// Size of the fresh cached model list for the endpoint, if there is one.
    pub cached_models: Option<usize>,
}

impl ChatSession {
    /// Creates a new chat session from a configuration.
    ///
    /// No request is made until a model list or a reply is needed.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self {
            client,
            catalog: ModelCatalog::with_ttl(config.catalog_ttl),
            conversation: Conversation::with_system_prompt(config.system_prompt.clone()),
            config,
            turns_completed: 0,
            turns_failed: 0,
            fragments_received: 0,
        })
    }

    fn build_client(config: &ChatConfig) -> Result<Ollama> {
        Ollama::with_options(
            config.endpoint.clone(),
            config.tags_timeout,
            config.chat_timeout,
        )
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Adds the user message to the conversation
    /// 2. Sends a streaming request with the whole conversation
    /// 3. Renders fragments as they arrive
    /// 4. Adds the trimmed reply to the conversation and returns it
    ///
    /// If the request fails, the stream fails, or the renderer asks to interrupt, the partial
    /// reply is discarded and no assistant turn is added.  The user turn stays.
    ///
    /// # Errors
    ///
    /// Returns an error if no model is available, the request fails, or the stream fails.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let Some(model) = self.ensure_model().await else {
            return Err(Error::validation(
                "no model selected; use /model <name>",
                Some("model".to_string()),
            ));
        };

        self.conversation.append_user(user_input);
        match self.stream_reply(&model, renderer).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                self.conversation.append_assistant(reply.clone());
                self.turns_completed += 1;
                SESSION_TURNS.click();
                Ok(reply)
            }
            Err(err) => {
                self.turns_failed += 1;
                SESSION_FAILED_TURNS.click();
                Err(err)
            }
        }
    }

    async fn stream_reply(&mut self, model: &str, renderer: &mut dyn Renderer) -> Result<String> {
        let mut fragments = self
            .client
            .stream_chat(model, self.conversation.messages(), self.config.temperature)
            .await?;

        let mut reply = String::new();
        loop {
            if renderer.should_interrupt() {
                renderer.print_interrupted();
                return Err(Error::abort("interrupted by user"));
            }
            let fragment = tokio::select! {
                fragment = fragments.next() => fragment,
                _ = tokio::time::sleep(INTERRUPT_POLL) => continue,
            };
            let Some(fragment) = fragment else {
                break;
            };
            let fragment = fragment?;
            self.fragments_received += 1;
            renderer.print_text(&fragment);
            reply.push_str(&fragment);
        }
        renderer.finish_response();
        Ok(reply)
    }

    /// Returns the selected model, selecting the first catalog entry if none is set.
    pub async fn ensure_model(&mut self) -> Option<String> {
        if self.config.model.is_none() {
            self.config.model = self.models().await.into_iter().next();
        }
        self.config.model.clone()
    }

    /// Returns the models available at the current endpoint.
    ///
    /// Never fails; see [`ModelCatalog::get`].
    pub async fn models(&mut self) -> Vec<String> {
        self.catalog.get(&self.client).await
    }

    /// Forgets every cached model list and fetches the current endpoint's again.
    pub async fn refresh_models(&mut self) -> Vec<String> {
        self.catalog.invalidate();
        self.models().await
    }

    /// Resets the conversation to its system message.
    pub fn clear(&mut self) {
        self.conversation.reset();
    }

    /// Returns the conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Changes the model used for responses.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = Some(model.into());
    }

    /// Returns the current model, if one is selected.
    pub fn model(&self) -> Option<&str> {
        self.config.model.as_deref()
    }

    /// Sets the sampling temperature.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(Error::validation(
                format!("temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"),
                Some("temperature".to_string()),
            ));
        }
        self.config.temperature = temperature;
        Ok(())
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.config.temperature
    }

    /// Switches to another endpoint, keeping the conversation.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> Result<()> {
        let config = self.config.clone().with_endpoint(endpoint);
        self.client = Self::build_client(&config)?;
        self.config = config;
        Ok(())
    }

    /// Replaces the credential of the current endpoint.
    pub fn set_api_key(&mut self, api_key: Option<String>) -> Result<()> {
        let endpoint = self.config.endpoint.clone().with_api_key(api_key);
        self.set_endpoint(endpoint)
    }

    /// Returns the current endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Sets the system prompt used from the next [`clear`](Self::clear) on.
    /// `None` restores the default instruction.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        let prompt = prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        self.conversation.set_system_prompt(prompt.clone());
        self.config.system_prompt = prompt;
    }

    /// Returns the system prompt applied on reset.
    pub fn system_prompt(&self) -> &str {
        &self.config.system_prompt
    }

    /// Whether output should be styled.
    pub fn use_color(&self) -> bool {
        self.config.use_color
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            endpoint: self.config.endpoint.clone(),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            system_prompt: self.config.system_prompt.clone(),
            message_count: self.message_count(),
            turns_completed: self.turns_completed,
            turns_failed: self.turns_failed,
            fragments_received: self.fragments_received,
            cached_models: self
                .catalog
                .cached(&self.config.endpoint)
                .map(|models| models.len()),
        }
    }
}

/// Runs `work` until it finishes or the renderer asks to interrupt.
///
/// Returns `None` if interrupted, dropping `work` unfinished.
pub async fn interruptible<F: Future>(renderer: &dyn Renderer, work: F) -> Option<F::Output> {
    tokio::pin!(work);
    loop {
        if renderer.should_interrupt() {
            return None;
        }
        tokio::select! {
            output = &mut work => return Some(output),
            _ = tokio::time::sleep(INTERRUPT_POLL) => {}
        }
    }
}
