//! Server-sent event decoding for `streamGenerateContent?alt=sse`

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use super::types::{ApiErrorResponse, GenerateContentResponse};
use crate::error::{Error, Result};
use crate::providers::llm::FragmentStream;

/// Incremental decoder turning raw SSE bytes into text fragments
///
/// Network chunks may split events, lines or UTF-8 sequences anywhere, so
/// bytes are buffered until a blank line terminates an event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the fragments of every completed event
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some((end, delimiter_len)) = find_event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + delimiter_len).take(end).collect();
            if let Some(item) = decode_event(&event) {
                out.push(item);
            }
        }
        out
    }

    /// Flush a trailing event that was not followed by a blank line
    pub fn finish(&mut self) -> Vec<Result<String>> {
        let event = std::mem::take(&mut self.buffer);
        decode_event(&event).into_iter().collect()
    }
}

/// Position and length of the first event delimiter (`\n\n` or `\r\n\r\n`)
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Decode one event; `None` for events carrying no text
fn decode_event(raw: &[u8]) -> Option<Result<String>> {
    let raw = String::from_utf8_lossy(raw);
    let data: Vec<&str> = raw
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();

    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload.trim().is_empty() || payload.trim() == "[DONE]" {
        return None;
    }

    if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&payload) {
        return Some(Err(Error::llm(format!("Gemini stream error: {}", err.error))));
    }

    let response: GenerateContentResponse = match serde_json::from_str(&payload) {
        Ok(response) => response,
        Err(e) => {
            return Some(Err(Error::llm(format!(
                "Malformed Gemini stream event: {}",
                e
            ))))
        }
    };

    if let Some(reason) = response.block_reason() {
        return Some(Err(Error::llm(format!("Prompt blocked by Gemini: {}", reason))));
    }

    let text = response.text();
    if text.is_empty() {
        None
    } else {
        Some(Ok(text))
    }
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    done: bool,
}

/// Adapt a byte stream of SSE into a stream of text fragments
///
/// The stream ends after the first error.
pub fn decode_sse_stream<S, E>(inner: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(inner),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => st.pending.extend(st.decoder.push(&bytes)),
                Some(Err(e)) => {
                    st.done = true;
                    st.pending
                        .push_back(Err(Error::llm(format!("Gemini stream interrupted: {}", e))));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    });

    Box::pin(stream)
}
