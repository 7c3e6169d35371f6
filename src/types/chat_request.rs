use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Generation options sent alongside a chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Body of a `POST /api/chat` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model identifier.
    pub model: String,

    /// The full ordered transcript.
    pub messages: Vec<Message>,

    /// Whether the service should stream partial responses.
    pub stream: bool,

    /// Generation options.
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Create a streaming request for `model` over `messages`.
    pub fn streaming(model: impl Into<String>, messages: &[Message], temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: messages.to_vec(),
            stream: true,
            options: ChatOptions {
                temperature: Some(temperature),
            },
        }
    }
}
