// Public modules
pub mod catalog;
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod ndjson;
pub mod observability;
pub mod render;
pub mod transport;
pub mod types;

// Re-exports
pub use catalog::{DEFAULT_MODELS, ModelCatalog, ModelSource};
pub use client::Ollama;
pub use conversation::{Conversation, DEFAULT_SYSTEM_PROMPT};
pub use error::{Error, Result};
pub use ndjson::FragmentStream;
pub use observability::register_biometrics;
pub use transport::Endpoint;
pub use types::*;
