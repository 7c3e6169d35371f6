//! The conversation transcript.

use crate::types::{Message, Role};

/// Instruction used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// An ordered, append-only transcript that always begins with one system message.
///
/// The only ways to change a conversation are appending a user or assistant turn and resetting
/// it back to its single system message.  Entries are never edited, removed, or reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// A conversation framed by [`DEFAULT_SYSTEM_PROMPT`].
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    /// A conversation framed by `prompt`.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let system_prompt = prompt.into();
        let messages = vec![Message::system(system_prompt.clone())];
        Self {
            system_prompt,
            messages,
        }
    }

    /// Replaces the transcript with a single system message.
    pub fn reset(&mut self) {
        self.messages = vec![Message::system(self.system_prompt.clone())];
    }

    /// Changes the instruction used by the next [`reset`](Self::reset).
    ///
    /// The current transcript keeps the system message it started with.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// The instruction used on reset.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Appends a user turn.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Appends an assistant turn.
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Every message, system message first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The messages a user sees: everything but system messages.
    pub fn turns(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; a conversation holds at least its system message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_one_system_message() {
        let conversation = Conversation::new();
        assert_eq!(
            conversation.messages(),
            &[Message::system(DEFAULT_SYSTEM_PROMPT)]
        );
        assert_eq!(conversation.turns().count(), 0);
        assert!(!conversation.is_empty());
    }

    #[test]
    fn appends_keep_order() {
        let mut conversation = Conversation::new();
        conversation.append_user("one");
        conversation.append_assistant("two");
        conversation.append_user("three");
        let before = conversation.messages().to_vec();
        conversation.append_assistant("four");
        assert_eq!(&conversation.messages()[..before.len()], before.as_slice());
        assert_eq!(
            conversation
                .turns()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>(),
            vec!["one", "two", "three", "four"]
        );
        assert_eq!(conversation.last(), Some(&Message::assistant("four")));
    }

    #[test]
    fn reset_leaves_exactly_one_system_message() {
        let mut conversation = Conversation::with_system_prompt("Be terse.");
        conversation.append_user("hi");
        conversation.append_assistant("hello");
        conversation.reset();
        assert_eq!(conversation.messages(), &[Message::system("Be terse.")]);
        conversation.reset();
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn new_prompt_applies_on_reset() {
        let mut conversation = Conversation::new();
        conversation.set_system_prompt("Answer in French.");
        assert_eq!(
            conversation.messages(),
            &[Message::system(DEFAULT_SYSTEM_PROMPT)]
        );
        conversation.reset();
        assert_eq!(
            conversation.messages(),
            &[Message::system("Answer in French.")]
        );
    }
}
