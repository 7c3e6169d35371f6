use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role-tagged message, exactly as it goes over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The role of the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl Message {
    /// Create a new `Message` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system `Message`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn message_serialization() {
        let message = Message::user("Hello!");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": "Hello!"
            })
        );
    }

    #[test]
    fn message_deserialization() {
        let message: Message =
            serde_json::from_value(json!({"role": "assistant", "content": "Hi"})).unwrap();
        assert_eq!(message, Message::assistant("Hi"));
    }

    #[test]
    fn role_display_matches_wire_name() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(to_value(role).unwrap(), json!(role.to_string()));
        }
    }
}
