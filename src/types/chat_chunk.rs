use serde_json::Value;

/// Classification of a single non-blank line of a streamed `POST /api/chat` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLine {
    /// Text to yield.  `done` is set when the same record also ends the stream.
    Fragment {
        /// The non-empty text.
        text: String,
        /// Whether this record is also the terminal one.
        done: bool,
    },

    /// Terminal record without text.
    Done,

    /// The service reported an error.
    Error(String),

    /// Nothing to yield; reading continues.
    Skip,
}

impl ChunkLine {
    /// Classify one line of the stream.
    ///
    /// Only lines that are not JSON objects are [`ChunkLine::Skip`] outright.  Fields are read
    /// loosely: an `error` key wins whatever its value, `done` counts only when it is `true`, and
    /// content that is not a string is treated as empty.
    pub fn parse(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(record) if record.is_object() => Self::classify(&record),
            _ => ChunkLine::Skip,
        }
    }

    fn classify(record: &Value) -> Self {
        if let Some(error) = record.get("error") {
            let text = match error {
                Value::String(text) => text.clone(),
                Value::Null => "service reported an error".to_string(),
                other => other.to_string(),
            };
            return ChunkLine::Error(text);
        }
        let done = record.get("done").and_then(Value::as_bool).unwrap_or(false);
        let text = record
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match (text.is_empty(), done) {
            (false, done) => ChunkLine::Fragment {
                text: text.to_string(),
                done,
            },
            (true, true) => ChunkLine::Done,
            (true, false) => ChunkLine::Skip,
        }
    }
}
