//! @ai:module:intent Line-oriented streaming bodies (NDJSON, SSE) as cancellable text streams
//! @ai:module:layer infrastructure
//! @ai:module:stateless false

use crate::adapter::{generation_error, TextStream};
use crate::catalog::BackendType;
use crate::runner::CancellationToken;
use futures::stream::{BoxStream, StreamExt};

/// What one body line means to the caller
#[derive(Debug, PartialEq)]
pub(crate) enum LineEvent {
    Chunk(String),
    Skip,
    Done,
}

struct LineState<F> {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
    cancel: CancellationToken,
    backend: BackendType,
    model_id: String,
    parse: F,
}

impl<F> LineState<F> {
    /// Pop the next complete line, or the trailing partial line once the body is exhausted
    fn next_line(&mut self) -> Option<String> {
        let end = match self.buffer.iter().position(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None if self.eof && !self.buffer.is_empty() => self.buffer.len(),
            None => return None,
        };

        let raw: Vec<u8> = self.buffer.drain(..end).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Read the rest of the body and throw it away so the backend finishes the response
    async fn drain(&mut self) {
        let mut discarded = self.buffer.len();
        self.buffer.clear();

        while !self.eof {
            match self.body.next().await {
                Some(Ok(bytes)) => discarded += bytes.len(),
                Some(Err(_)) | None => self.eof = true,
            }
        }
        self.finished = true;

        tracing::debug!(
            "[{}/{}] stream cancelled, drained {} bytes",
            self.backend,
            self.model_id,
            discarded
        );
    }
}

/// @ai:intent Split a response body into lines and map them through `parse`
/// @ai:post the stream ends at LineEvent::Done, at end of body, or when `cancel` fires
/// @ai:effects network
pub(crate) fn line_stream<F>(
    response: reqwest::Response,
    cancel: CancellationToken,
    backend: BackendType,
    model_id: String,
    parse: F,
) -> TextStream
where
    F: Fn(&str) -> std::result::Result<LineEvent, String> + Send + 'static,
{
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed();
    body_lines(body, cancel, backend, model_id, parse)
}

/// @ai:intent Line splitting over any byte-chunk stream
/// @ai:post once `cancel` fires no further chunk is yielded and the body is read to its end
fn body_lines<F>(
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    cancel: CancellationToken,
    backend: BackendType,
    model_id: String,
    parse: F,
) -> TextStream
where
    F: Fn(&str) -> std::result::Result<LineEvent, String> + Send + 'static,
{
    let state = LineState {
        body,
        buffer: Vec::new(),
        eof: false,
        finished: false,
        cancel,
        backend,
        model_id,
        parse,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if state.cancel.is_cancelled() {
                state.drain().await;
                return None;
            }

            if let Some(line) = state.next_line() {
                if line.is_empty() {
                    continue;
                }
                match (state.parse)(&line) {
                    Ok(LineEvent::Chunk(text)) => return Some((Ok(text), state)),
                    Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::Done) => return None,
                    Err(message) => {
                        state.finished = true;
                        let err = generation_error(state.backend, &state.model_id, message);
                        return Some((Err(err), state));
                    }
                }
            }

            if state.eof {
                return None;
            }

            let next = tokio::select! {
                _ = state.cancel.cancelled() => None,
                next = state.body.next() => Some(next),
            };
            let Some(next) = next else {
                state.drain().await;
                return None;
            };

            match next {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.finished = true;
                    let err = generation_error(
                        state.backend,
                        &state.model_id,
                        format!("stream interrupted: {}", e),
                    );
                    return Some((Err(err), state));
                }
                None => state.eof = true,
            }
        }
    })
    .boxed()
}

/// @ai:intent Extract the payload of an SSE `data:` line
/// @ai:effects pure
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn parse(line: &str) -> std::result::Result<LineEvent, String> {
        match line {
            "[DONE]" => Ok(LineEvent::Done),
            "ping" => Ok(LineEvent::Skip),
            "bad" => Err("unparseable line".to_string()),
            text => Ok(LineEvent::Chunk(text.to_string())),
        }
    }

    fn lines_of(chunks: &[&str], cancel: CancellationToken) -> TextStream {
        let body: Vec<reqwest::Result<Vec<u8>>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        body_lines(
            futures::stream::iter(body).boxed(),
            cancel,
            BackendType::Ollama,
            "m1".to_string(),
            parse,
        )
    }

    async fn collect_ok(stream: TextStream) -> Vec<String> {
        stream.map(|chunk| chunk.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let stream = lines_of(&["hel", "lo\nwor", "ld\n\nping\n"], CancellationToken::new());
        assert_eq!(collect_ok(stream).await, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_trailing_partial_line_is_emitted() {
        let stream = lines_of(&["first\r\nsec", "ond"], CancellationToken::new());
        assert_eq!(collect_ok(stream).await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_done_ends_stream() {
        let stream = lines_of(&["a\n[DONE]\nb\n"], CancellationToken::new());
        assert_eq!(collect_ok(stream).await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_parse_error_is_last_item() {
        let mut stream = lines_of(&["a\nbad\nc\n"], CancellationToken::new());

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("unparseable line"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_chunks_and_drains_body() {
        let (tx, rx) = mpsc::unbounded::<reqwest::Result<Vec<u8>>>();
        let read = Arc::new(AtomicUsize::new(0));
        let counted = read.clone();
        let body = rx
            .inspect(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .boxed();

        let cancel = CancellationToken::new();
        let mut stream = body_lines(
            body,
            cancel.clone(),
            BackendType::OpenAi,
            "m2".to_string(),
            parse,
        );

        tx.unbounded_send(Ok(b"one\n".to_vec())).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");

        cancel.cancel();
        tx.unbounded_send(Ok(b"two\n".to_vec())).unwrap();
        tx.unbounded_send(Ok(b"three\n".to_vec())).unwrap();
        drop(tx);

        assert!(stream.next().await.is_none());
        assert_eq!(read.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_body() {
        let (tx, rx) = mpsc::unbounded::<reqwest::Result<Vec<u8>>>();
        let cancel = CancellationToken::new();
        let mut stream = body_lines(
            rx.boxed(),
            cancel.clone(),
            BackendType::Anthropic,
            "m3".to_string(),
            parse,
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
            tx.unbounded_send(Ok(b"late\n".to_vec())).unwrap();
        });

        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_sse_data() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data("event: ping"), None);
    }
}
