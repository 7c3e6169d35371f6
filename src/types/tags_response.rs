use serde::{Deserialize, Serialize};

/// A model record from `GET /api/tags`.
///
/// Only `name` is required; the service's other fields (size, digest, details) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Model identifier, usually `name:tag`.
    pub name: String,
}

/// Response body of `GET /api/tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsResponse {
    /// The models the service reports, in service order.
    #[serde(default)]
    pub models: Vec<ModelRecord>,
}

impl TagsResponse {
    /// The model names in service order.
    pub fn names(self) -> Vec<String> {
        self.models.into_iter().map(|m| m.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_preserve_order_and_duplicates() {
        let response: TagsResponse = serde_json::from_value(json!({
            "models": [
                {"name": "qwen2.5:7b", "size": 4683087332u64, "digest": "abc"},
                {"name": "llama3.1:latest", "details": {"family": "llama"}},
                {"name": "qwen2.5:7b"}
            ]
        }))
        .unwrap();
        assert_eq!(
            response.names(),
            vec!["qwen2.5:7b", "llama3.1:latest", "qwen2.5:7b"]
        );
    }

    #[test]
    fn missing_models_is_empty() {
        let response: TagsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.names().is_empty());
    }

    #[test]
    fn missing_name_is_an_error() {
        let result = serde_json::from_value::<TagsResponse>(json!({"models": [{"model": "x"}]}));
        assert!(result.is_err());
    }
}
