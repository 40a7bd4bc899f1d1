//! Server-sent event decoding for OpenAI-style completion streams.
//!
//! The engine and the gateway's own `/v1/chat/completions` both stream
//! `text/event-stream` bodies of the form:
//!
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"hi"}}]}
//!
//! data: [DONE]
//! ```
//!
//! [`decode_chunks`] buffers raw bytes until a full line is available, so
//! frames split across network reads (including inside a multi-byte UTF-8
//! sequence) decode correctly.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use llmserve_core::contracts::ChatCompletionChunk;
use llmserve_core::{ClientError, EngineError};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding an event stream.
#[derive(Debug, Error)]
pub enum SseError {
    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error("Malformed event payload: {0}")]
    Decode(String),

    /// The stream carried an `{"error": ...}` event instead of a chunk.
    #[error("Upstream reported an error: {0}")]
    Upstream(String),
}

impl From<SseError> for EngineError {
    fn from(err: SseError) -> Self {
        match err {
            SseError::Transport(msg) | SseError::Upstream(msg) => Self::Stream(msg),
            SseError::Decode(msg) => Self::Protocol(msg),
        }
    }
}

impl From<SseError> for ClientError {
    fn from(err: SseError) -> Self {
        match err {
            SseError::Transport(msg) => Self::Transport(msg),
            SseError::Decode(msg) => Self::Decode(msg),
            SseError::Upstream(msg) => Self::Engine(EngineError::Stream(msg)),
        }
    }
}

/// One classified event-stream line.
enum Line {
    Skip,
    Done,
    Chunk(Result<ChatCompletionChunk, SseError>),
}

/// State threaded through the `unfold` stream.
struct DecodeState {
    stream: BoxStream<'static, Result<Bytes, SseError>>,
    buf: BytesMut,
    done: bool,
}

/// Decode an SSE byte stream into chat completion chunks.
///
/// The returned stream ends at `data: [DONE]`, at the end of the body, or
/// right after yielding its first error.
pub fn decode_chunks<S, E>(byte_stream: S) -> BoxStream<'static, Result<ChatCompletionChunk, SseError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + 'static,
{
    let state = DecodeState {
        stream: byte_stream
            .map(|item| item.map_err(|e| SseError::Transport(e.to_string())))
            .boxed(),
        buf: BytesMut::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end + 1);
                match classify(&line) {
                    Line::Skip => continue,
                    Line::Done => return None,
                    Line::Chunk(result) => {
                        st.done = result.is_err();
                        return Some((result, st));
                    }
                }
            }

            match st.stream.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    // A final line may arrive without its trailing newline
                    let rest = st.buf.split();
                    return match classify(&rest) {
                        Line::Chunk(result) => Some((result, st)),
                        Line::Skip | Line::Done => None,
                    };
                }
            }
        }
    })
    .boxed()
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

fn classify(raw: &[u8]) -> Line {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();

    // Blank separators, comments and non-data fields (event:, id:, retry:)
    let Some(data) = line.strip_prefix("data:") else {
        return Line::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return Line::Skip;
    }
    if data == "[DONE]" {
        return Line::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => return Line::Chunk(Err(SseError::Decode(e.to_string()))),
    };

    if let Some(error) = value.get("error") {
        return Line::Chunk(Err(SseError::Upstream(error_message(error))));
    }

    Line::Chunk(serde_json::from_value(value).map_err(|e| SseError::Decode(e.to_string())))
}

/// Pull a human-readable message out of an OpenAI-style error object.
pub(crate) fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn frames(parts: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let owned: Vec<Result<Bytes, Infallible>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures_util::stream::iter(owned)
    }

    fn chunk_json(content: &str) -> String {
        format!(
            r#"{{"id":"c1","object":"chat.completion.chunk","created":1,"model":"m","choices":[{{"index":0,"delta":{{"content":"{content}"}},"finish_reason":null}}]}}"#
        )
    }

    async fn contents(parts: &[&str]) -> Vec<Result<String, String>> {
        decode_chunks(frames(parts))
            .map(|r| {
                r.map(|c| c.delta_content().unwrap_or_default().to_string())
                    .map_err(|e| e.to_string())
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_decodes_frames_until_done() {
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\ndata: {}\n\n",
            chunk_json("a"),
            chunk_json("b"),
            chunk_json("never")
        );
        let out = contents(&[body.as_str()]).await;
        assert_eq!(out, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = format!("data: {}\n\n", chunk_json("héllo"));
        let bytes = frame.as_bytes();
        // Split inside the multi-byte 'é'
        let cut = frame.find('é').unwrap() + 1;
        let first = String::from_utf8_lossy(&bytes[..cut]).into_owned();
        assert!(first.ends_with('\u{FFFD}'));

        let parts: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let out: Vec<_> = decode_chunks(futures_util::stream::iter(parts))
            .map(|r| r.unwrap().delta_content().unwrap_or_default().to_string())
            .collect()
            .await;
        assert_eq!(out, vec!["héllo".to_string()]);
    }

    #[tokio::test]
    async fn test_comments_and_event_fields_are_skipped() {
        let body = format!(
            ": keep-alive\nevent: message\nid: 7\ndata: {}\n\n",
            chunk_json("x")
        );
        assert_eq!(contents(&[body.as_str()]).await, vec![Ok("x".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_delta_is_preserved() {
        let body = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}

"#;
        assert_eq!(contents(&[body]).await, vec![Ok(String::new())]);
    }

    #[tokio::test]
    async fn test_error_event_ends_stream() {
        let body = format!(
            "data: {}\n\ndata: {{\"error\":{{\"message\":\"context overflow\"}}}}\n\ndata: {}\n\n",
            chunk_json("a"),
            chunk_json("b")
        );
        let out = contents(&[body.as_str()]).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("a".to_string()));
        assert!(out[1].as_ref().unwrap_err().contains("context overflow"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_decode_error() {
        let mut stream = decode_chunks(frames(&["data: {not json\n\n"]));
        assert!(matches!(stream.next().await, Some(Err(SseError::Decode(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let body = format!("data: {}", chunk_json("tail"));
        assert_eq!(contents(&[body.as_str()]).await, vec![Ok("tail".to_string())]);
    }

    #[tokio::test]
    async fn test_transport_error_is_yielded_once() {
        let parts: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(format!("data: {}\n\n", chunk_json("a")))),
            Err("connection reset".to_string()),
            Ok(Bytes::from(format!("data: {}\n\n", chunk_json("b")))),
        ];
        let out: Vec<_> = decode_chunks(futures_util::stream::iter(parts)).collect().await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(SseError::Transport(ref m)) if m == "connection reset"));
    }

    #[test]
    fn test_error_conversions() {
        assert!(matches!(
            EngineError::from(SseError::Decode("x".into())),
            EngineError::Protocol(_)
        ));
        assert!(matches!(
            ClientError::from(SseError::Transport("x".into())),
            ClientError::Transport(_)
        ));
    }
}
