// Public modules
pub mod chat_chunk;
pub mod chat_request;
pub mod message;
pub mod tags_response;

// Re-exports
pub use chat_chunk::ChunkLine;
pub use chat_request::{ChatOptions, ChatRequest};
pub use message::{Message, Role};
pub use tags_response::{ModelRecord, TagsResponse};
