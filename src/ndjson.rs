//! Newline-delimited JSON processing for streaming chat responses.
//!
//! The chat endpoint answers with one JSON object per line.  This module turns the raw byte
//! stream of such a response into a stream of text fragments:
//!
//! - `Some(Ok(fragment))` for every non-empty `message.content`, in line order;
//! - `None` once a `done: true` record has been seen or the body ends;
//! - `Some(Err(_))` exactly once if the service reports an `error` or the body cannot be read,
//!   after which the stream is exhausted.
//!
//! Blank lines and lines that are not JSON objects are skipped.  The stream reads one line at a time,
//! so every fragment is handed to the consumer before the next line is read.  The byte stream is
//! released as soon as the stream reaches a terminal state, and dropping the stream early
//! releases it too.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::observability::{
    STREAM_BYTES, STREAM_DURATION, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_SKIPPED_LINES,
};
use crate::types::ChunkLine;

/// A lazy, finite stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;
type Lines = FramedRead<StreamReader<ByteStream, Bytes>, LinesCodec>;

struct Reader {
    lines: Lines,
    started: Instant,
}

impl Reader {
    fn finish(self) {
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
    }
}

/// Process a stream of bytes into a stream of text fragments.
pub fn process_ndjson<S>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    let byte_stream: ByteStream =
        Box::pin(byte_stream.inspect_ok(|bytes| STREAM_BYTES.count(bytes.len() as u64)));
    let reader = Reader {
        lines: FramedRead::new(StreamReader::new(byte_stream), LinesCodec::new()),
        started: Instant::now(),
    };

    Box::pin(stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        loop {
            let line = match reader.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    reader.finish();
                    return Some((Err(line_error(err)), None));
                }
                None => {
                    reader.finish();
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match ChunkLine::parse(&line) {
                ChunkLine::Fragment { text, done } => {
                    STREAM_FRAGMENTS.click();
                    if done {
                        reader.finish();
                        return Some((Ok(text), None));
                    }
                    return Some((Ok(text), Some(reader)));
                }
                ChunkLine::Done => {
                    reader.finish();
                    return None;
                }
                ChunkLine::Error(message) => {
                    STREAM_ERRORS.click();
                    tracing::debug!(%message, "service reported an error mid-stream");
                    reader.finish();
                    return Some((Err(Error::generation(message)), None));
                }
                ChunkLine::Skip => {
                    STREAM_SKIPPED_LINES.click();
                    tracing::debug!(%line, "skipping stream line");
                }
            }
        }
    }))
}

/// Drain a fragment stream into the concatenated text.
///
/// Fails with the first error the stream produces; text gathered before the error is dropped.
///
/// ```
/// # use bytes::Bytes;
/// # use futures::stream;
/// # use ollamachat::ndjson::{collect_fragments, process_ndjson};
/// # tokio_test::block_on(async {
/// let body = concat!(
///     r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#, "\n",
///     r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#, "\n",
///     r#"{"done":true}"#, "\n",
/// );
/// let bytes = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(body))]);
/// let text = collect_fragments(process_ndjson(bytes)).await.unwrap();
/// assert_eq!(text, "Hello");
/// # });
/// ```
pub async fn collect_fragments(mut fragments: FragmentStream) -> Result<String> {
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

fn line_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            Error::streaming("line exceeds maximum length", None)
        }
        LinesCodecError::Io(err) if err.kind() == io::ErrorKind::InvalidData => {
            Error::encoding(format!("Invalid UTF-8 in stream: {err}"), Some(Box::new(err)))
        }
        LinesCodecError::Io(err) => {
            let timed_out = err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(reqwest::Error::is_timeout);
            if timed_out {
                Error::timeout(format!("Stream timed out: {err}"), None)
            } else {
                Error::streaming(format!("Error in HTTP stream: {err}"), Some(Box::new(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn chunks(parts: &[&str]) -> impl Stream<Item = io::Result<Bytes>> + Send + use<> {
        let parts: Vec<io::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(parts)
    }

    fn lines(lines: &[&str]) -> impl Stream<Item = io::Result<Bytes>> + Send + use<> {
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        chunks(&[&body])
    }

    async fn drain(mut fragments: FragmentStream) -> (Vec<String>, Option<Error>) {
        let mut seen = Vec::new();
        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => seen.push(text),
                Err(err) => return (seen, Some(err)),
            }
        }
        (seen, None)
    }

    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn tracked(
        inner: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
    ) -> (
        impl Stream<Item = io::Result<Bytes>> + Send + 'static,
        Arc<AtomicBool>,
    ) {
        let released = Arc::new(AtomicBool::new(false));
        let flag = ReleaseFlag(Arc::clone(&released));
        let stream = inner.map(move |item| {
            let _ = &flag;
            item
        });
        (stream, released)
    }

    #[tokio::test]
    async fn hello() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"Hel"}}"#,
            r#"{"message":{"content":"lo"}}"#,
            r#"{"done":true}"#,
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["Hel", "lo"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn concatenation_matches_source_text() {
        let fragments = process_ndjson(lines(&[
            r#"{"model":"llama3.1","message":{"role":"assistant","content":"The"},"done":false}"#,
            r#"{"model":"llama3.1","message":{"role":"assistant","content":" quick"},"done":false}"#,
            r#"{"model":"llama3.1","message":{"role":"assistant","content":" brown\n"},"done":false}"#,
            r#"{"model":"llama3.1","message":{"role":"assistant","content":"fox."},"done":false}"#,
            r#"{"model":"llama3.1","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
        ]));
        assert_eq!(
            collect_fragments(fragments).await.unwrap(),
            "The quick brown\nfox."
        );
    }

    #[tokio::test]
    async fn error_stops_stream() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"partial"}}"#,
            r#"{"error":"rate limited"}"#,
            r#"{"message":{"content":"never"}}"#,
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["partial"]);
        let err = err.expect("stream should fail");
        assert!(err.is_generation());
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn stream_is_exhausted_after_error() {
        let mut fragments = process_ndjson(lines(&[
            r#"{"error":"model not loaded"}"#,
            r#"{"message":{"content":"never"}}"#,
        ]));
        assert!(fragments.next().await.unwrap().is_err());
        assert!(fragments.next().await.is_none());
    }

    #[tokio::test]
    async fn error_record_with_mistyped_message_fails_stream() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"partial"}}"#,
            r#"{"error":"rate limited","message":"Too Many Requests"}"#,
        ]));
        let err = collect_fragments(fragments).await.unwrap_err();
        assert!(err.is_generation());
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn done_with_null_content_stops_consumption() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"Hi"}}"#,
            r#"{"message":{"role":"assistant","content":null},"done":true}"#,
            r#"{"message":{"content":" after-done"}}"#,
        ]));
        assert_eq!(collect_fragments(fragments).await.unwrap(), "Hi");
    }

    #[tokio::test]
    async fn blank_and_garbage_lines_are_skipped() {
        let fragments = process_ndjson(lines(&[
            "",
            r#"{"message":{"content":"a"}}"#,
            "not json",
            "   ",
            r#"{"message":{"content":"b"}}"#,
            r#"{"message":{"content":""},"done":false}"#,
            r#"{"message":{"content":"c"}}"#,
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn done_stops_consumption() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"only"}}"#,
            r#"{"done":true}"#,
            r#"{"message":{"content":"after"}}"#,
            r#"{"error":"ignored"}"#,
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["only"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn done_with_final_fragment() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"Hi"}}"#,
            r#"{"message":{"content":" there"},"done":true}"#,
            r#"{"message":{"content":"after"}}"#,
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["Hi", " there"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let fragments = process_ndjson(chunks(&[
            r#"{"message":{"con"#,
            r#"tent":"Hel"}}"#,
            "\n{\"message\":{\"content\":\"lo\"}}\r\n{\"do",
            "ne\":true}",
        ]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["Hel", "lo"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn final_line_without_newline() {
        let fragments = process_ndjson(chunks(&[r#"{"message":{"content":"tail"}}"#]));
        let (seen, err) = drain(fragments).await;
        assert_eq!(seen, vec!["tail"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn body_ending_without_done_is_success() {
        let fragments = process_ndjson(lines(&[r#"{"message":{"content":"cut"}}"#]));
        assert_eq!(collect_fragments(fragments).await.unwrap(), "cut");
    }

    #[tokio::test]
    async fn read_failure_propagates() {
        let parts: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"a\"}}\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
        ];
        let (seen, err) = drain(process_ndjson(stream::iter(parts))).await;
        assert_eq!(seen, vec!["a"]);
        assert!(matches!(err, Some(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_encoding_error() {
        let parts: Vec<io::Result<Bytes>> = vec![Ok(Bytes::from_static(b"\xff\xfe\n"))];
        let (seen, err) = drain(process_ndjson(stream::iter(parts))).await;
        assert!(seen.is_empty());
        assert!(matches!(err, Some(Error::Encoding { .. })));
    }

    #[tokio::test]
    async fn collect_discards_partial_text_on_error() {
        let fragments = process_ndjson(lines(&[
            r#"{"message":{"content":"partial"}}"#,
            r#"{"error":"overloaded"}"#,
        ]));
        let err = collect_fragments(fragments).await.unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn released_after_done() {
        let (body, released) = tracked(lines(&[
            r#"{"message":{"content":"x"},"done":true}"#,
            r#"{"message":{"content":"y"}}"#,
        ]));
        let mut fragments = process_ndjson(body);
        assert_eq!(fragments.next().await.unwrap().unwrap(), "x");
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn released_after_error() {
        let (body, released) = tracked(lines(&[r#"{"error":"boom"}"#, r#"{"done":true}"#]));
        let mut fragments = process_ndjson(body);
        assert!(fragments.next().await.unwrap().is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn released_when_abandoned() {
        let (body, released) = tracked(lines(&[
            r#"{"message":{"content":"one"}}"#,
            r#"{"message":{"content":"two"}}"#,
        ]));
        let mut fragments = process_ndjson(body);
        assert_eq!(fragments.next().await.unwrap().unwrap(), "one");
        assert!(!released.load(Ordering::SeqCst));
        drop(fragments);
        assert!(released.load(Ordering::SeqCst));
    }
}
