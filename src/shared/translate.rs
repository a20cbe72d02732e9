//! Completion-to-OpenAI response translation
//!
//! A finished completion is rendered either as one `chat.completion` body or
//! as a finite sequence of [`StreamEvent`]s that a sink turns into SSE frames.
//! Retool returns the whole answer at once; streaming is simulated by slicing
//! the text into fixed-size character chunks.

use crate::handlers::openai::extractor::OpenAiError;
use crate::handlers::openai::types::{ChatCompletion, ChatCompletionChunk};
use crate::shared::completion::{CompletionError, CompletionResult};

/// SSE payload that terminates every stream
pub const DONE_MARKER: &str = "[DONE]";

/// One frame of a simulated stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Role announcement, content slice or stop chunk
    Chunk(ChatCompletionChunk),
    /// Failure reported in-band after the stream has started
    Error(OpenAiError),
    Done,
}

impl StreamEvent {
    /// True for chunks that carry answer text
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            StreamEvent::Chunk(chunk)
                if chunk.choices.first().is_some_and(|c| c.delta.content.is_some())
        )
    }

    /// SSE `data:` payload for this event
    pub fn to_data(&self) -> String {
        let encoded = match self {
            StreamEvent::Chunk(chunk) => serde_json::to_string(chunk),
            StreamEvent::Error(error) => serde_json::to_string(error),
            StreamEvent::Done => return DONE_MARKER.to_string(),
        };
        // Plain structs with string keys always serialize
        encoded.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize stream event");
            String::from("{}")
        })
    }
}

/// Split `text` into slices of at most `size` characters
///
/// Slices never split a UTF-8 sequence; concatenating them yields `text`.
/// A `size` of zero is treated as one.
pub fn chunk_text(text: &str, size: usize) -> impl Iterator<Item = &str> {
    let size = size.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Role,
    Content,
    Done,
    Exhausted,
}

/// Lazy producer of the events for one successful completion
///
/// Yields the role chunk, the content slices, the stop chunk and the end
/// marker, in that order, then nothing. All chunks share the result's id and
/// timestamp.
#[derive(Debug)]
pub struct ChunkProducer {
    result: CompletionResult,
    offset: usize,
    chunk_chars: usize,
    phase: Phase,
}

impl ChunkProducer {
    pub fn new(result: CompletionResult, chunk_chars: usize) -> Self {
        Self {
            result,
            offset: 0,
            chunk_chars: chunk_chars.max(1),
            phase: Phase::Role,
        }
    }

    fn next_slice(&mut self) -> Option<ChatCompletionChunk> {
        let rest = &self.result.content[self.offset..];
        let slice = chunk_text(rest, self.chunk_chars).next()?;
        self.offset += slice.len();
        Some(ChatCompletionChunk::content(
            &self.result.id,
            &self.result.model,
            self.result.created,
            slice,
        ))
    }
}

impl Iterator for ChunkProducer {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        match self.phase {
            Phase::Role => {
                self.phase = Phase::Content;
                let r = &self.result;
                Some(StreamEvent::Chunk(ChatCompletionChunk::initial(
                    &r.id, &r.model, r.created,
                )))
            }
            Phase::Content => {
                if let Some(chunk) = self.next_slice() {
                    return Some(StreamEvent::Chunk(chunk));
                }
                self.phase = Phase::Done;
                let r = &self.result;
                Some(StreamEvent::Chunk(ChatCompletionChunk::finish(
                    &r.id, &r.model, r.created,
                )))
            }
            Phase::Done => {
                self.phase = Phase::Exhausted;
                Some(StreamEvent::Done)
            }
            Phase::Exhausted => None,
        }
    }
}

/// Events of a stream, successful or failed
#[derive(Debug)]
pub enum StreamEvents {
    Completion(ChunkProducer),
    Failure(std::array::IntoIter<StreamEvent, 2>),
}

impl StreamEvents {
    /// One error chunk followed by the end marker
    pub fn failure(error: &CompletionError) -> Self {
        StreamEvents::Failure(
            [
                StreamEvent::Error(OpenAiError::service_unavailable(error.to_string())),
                StreamEvent::Done,
            ]
            .into_iter(),
        )
    }
}

impl Iterator for StreamEvents {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        match self {
            StreamEvents::Completion(producer) => producer.next(),
            StreamEvents::Failure(events) => events.next(),
        }
    }
}

/// Response payload chosen for one request
#[derive(Debug)]
pub enum OutputPayload {
    Completion(ChatCompletion),
    Stream(StreamEvents),
    Failure(CompletionError),
}

/// Render an orchestration outcome in the shape the client asked for
///
/// Streaming clients receive failures in-band; non-streaming clients get
/// [`OutputPayload::Failure`], which the handler maps to a 503 error body.
pub fn render(
    outcome: Result<CompletionResult, CompletionError>,
    wants_stream: bool,
    chunk_chars: usize,
) -> OutputPayload {
    match (outcome, wants_stream) {
        (Ok(result), false) => OutputPayload::Completion(ChatCompletion::from(result)),
        (Ok(result), true) => {
            OutputPayload::Stream(StreamEvents::Completion(ChunkProducer::new(result, chunk_chars)))
        }
        (Err(error), true) => OutputPayload::Stream(StreamEvents::failure(&error)),
        (Err(error), false) => OutputPayload::Failure(error),
    }
}
