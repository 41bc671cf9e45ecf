//! Streaming answer assembly.
//!
//! The backend streams newline-delimited JSON events. [`EventReader`] splits
//! the byte stream into events and [`StreamDecoder`] reduces them, in arrival
//! order, into a growing [`Answer`].

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::errors::{ChatError, ChatResult};
use crate::types::{is_non_empty, Answer, AnswerContext, ResponseMessage};

/// Type-erased response body
pub type ByteStream = Pin<Box<dyn Stream<Item = ChatResult<Vec<u8>>> + Send>>;

/// Splits a byte stream into JSON values, one per line
pub struct EventReader<S> {
    source: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<S, B> EventReader<S>
where
    S: Stream<Item = ChatResult<B>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Next event, or `None` once the source has ended and the buffer is drained.
    ///
    /// Lines may be split across chunks. Blank lines are skipped and a last
    /// line without a trailing newline is still decoded.
    pub async fn next_event(&mut self) -> Option<ChatResult<Value>> {
        loop {
            if let Some(line) = self.take_line() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Some(parse_line(&line));
            }

            if self.exhausted {
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    self.buffer.clear();
                    return None;
                }
                let line = std::mem::take(&mut self.buffer);
                return Some(parse_line(&line));
            }

            match self.source.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    self.exhausted = true;
                    self.buffer.clear();
                    return Some(Err(e));
                }
                None => self.exhausted = true,
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

fn parse_line(line: &[u8]) -> ChatResult<Value> {
    serde_json::from_slice(line).map_err(|e| {
        ChatError::Stream(format!(
            "Malformed event line ({}): {}",
            e,
            String::from_utf8_lossy(line)
        ))
    })
}

/// Lifecycle of one streamed answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingFirstChunk,
    Accumulating,
    Completed,
    Failed,
}

/// What a single event did to the answer
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStep {
    /// Retrieved documents arrived; the running snapshot was replaced
    Header,
    /// A text fragment was appended
    Delta(String),
    /// Auxiliary context keys were merged
    ContextMerged,
    /// The event had no recognised shape
    Skipped,
}

/// Reduces stream events into an answer
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    state: DecoderState,
    snapshot: Answer,
    saw_header: bool,
    text: String,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitingFirstChunk,
            snapshot: Answer::default(),
            saw_header: false,
            text: String::new(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn saw_header(&self) -> bool {
        self.saw_header
    }

    /// Apply one event.
    ///
    /// Precedence: header (context with data points), content delta, context
    /// augmentation, error. Anything else is skipped. Once completed or
    /// failed the decoder ignores further events.
    pub fn apply(&mut self, event: &Value) -> ChatResult<DecodeStep> {
        match self.state {
            DecoderState::Completed | DecoderState::Failed => {
                debug!(state = ?self.state, "Ignoring event after decoder finished");
                return Ok(DecodeStep::Skipped);
            }
            DecoderState::AwaitingFirstChunk => self.state = DecoderState::Accumulating,
            DecoderState::Accumulating => {}
        }

        let choice = event
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first());

        if let Some(choice) = choice {
            let context = choice.get("context").and_then(Value::as_object);

            if let Some(context) = context {
                if context
                    .get(AnswerContext::DATA_POINTS)
                    .is_some_and(is_non_empty)
                {
                    self.adopt_header(choice, context);
                    return Ok(DecodeStep::Header);
                }
            }

            if let Some(content) = choice
                .get("delta")
                .and_then(|delta| delta.get("content"))
                .and_then(Value::as_str)
                .filter(|content| !content.is_empty())
            {
                self.text.push_str(content);
                trace!(len = self.text.len(), "Appended content delta");
                return Ok(DecodeStep::Delta(content.to_string()));
            }

            if let Some(context) = context {
                self.snapshot.context.merge(context);
                debug!(keys = context.len(), "Merged context event");
                return Ok(DecodeStep::ContextMerged);
            }
        }

        if let Some(error) = event.get("error").filter(|e| is_non_empty(e)) {
            self.state = DecoderState::Failed;
            let message = match error {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            };
            warn!("Stream reported an error: {}", message);
            return Err(ChatError::Stream(message));
        }

        debug!("Skipping event with unrecognised shape");
        Ok(DecodeStep::Skipped)
    }

    fn adopt_header(&mut self, choice: &Value, context: &Map<String, Value>) {
        if self.saw_header {
            debug!("Replacing earlier header event");
        }
        let message = choice
            .get("delta")
            .cloned()
            .and_then(|delta| serde_json::from_value::<ResponseMessage>(delta).ok())
            .unwrap_or_default();

        // Keys merged before this header stay unless the header overwrites them
        let mut merged = self.snapshot.context.clone();
        merged.merge(context);

        self.snapshot = Answer {
            message,
            context: merged,
            session_state: choice.get("session_state").cloned().filter(|v| !v.is_null()),
        };
        self.saw_header = true;
    }

    /// The answer as it stands: header snapshot with the accumulated text
    pub fn snapshot(&self) -> Answer {
        let mut answer = self.snapshot.clone();
        answer.message.content = self.text.clone();
        answer
    }

    /// Mark the stream as ended and produce the final answer
    pub fn finish(&mut self) -> ChatResult<Answer> {
        if self.state == DecoderState::Failed {
            return Err(ChatError::Stream(
                "Stream already failed; no answer to finish".to_string(),
            ));
        }
        if !self.saw_header {
            warn!("Stream ended without a header event; answer has no supporting documents");
        }
        self.state = DecoderState::Completed;
        Ok(self.snapshot())
    }
}

/// Drain a whole byte stream into a final answer
pub async fn collect_answer<S, B>(source: S) -> ChatResult<Answer>
where
    S: Stream<Item = ChatResult<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut reader = EventReader::new(source);
    let mut decoder = StreamDecoder::new();
    while let Some(event) = reader.next_event().await {
        decoder.apply(&event?)?;
    }
    decoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    fn ndjson(events: &[Value]) -> Vec<u8> {
        let mut out = Vec::new();
        for event in events {
            out.extend_from_slice(event.to_string().as_bytes());
            out.push(b'\n');
        }
        out
    }

    fn chunked(bytes: Vec<u8>, size: usize) -> impl Stream<Item = ChatResult<Vec<u8>>> + Unpin {
        let chunks: Vec<ChatResult<Vec<u8>>> = bytes.chunks(size).map(|c| Ok(c.to_vec())).collect();
        stream::iter(chunks)
    }

    fn delta(content: &str) -> Value {
        json!({"choices": [{"delta": {"content": content}, "index": 0}]})
    }

    fn header() -> Value {
        json!({
            "choices": [{
                "delta": {"role": "assistant", "content": ""},
                "context": {
                    "data_points": {"text": ["tip.pdf: sign orders from the Orders activity"]},
                    "thoughts": [{"title": "Generated search query", "description": "sign orders"}],
                    "history": [{"role": "assistant2", "content": "x"}]
                },
                "session_state": {"conversation": 1}
            }],
            "object": "chat.completion.chunk"
        })
    }

    #[tokio::test]
    async fn test_header_first() {
        let bytes = ndjson(&[header(), delta("Hel"), delta("lo")]);
        let answer = collect_answer(chunked(bytes, 64)).await.unwrap();

        assert_eq!(answer.text(), "Hello");
        assert_eq!(answer.message.role, "assistant");
        assert!(answer.context.has_data_points());
        assert_eq!(answer.session_state, Some(json!({"conversation": 1})));
    }

    #[tokio::test]
    async fn test_header_last_backfills_data_points() {
        let bytes = ndjson(&[delta("Hel"), delta("lo"), header()]);
        let answer = collect_answer(chunked(bytes, 5)).await.unwrap();

        assert_eq!(answer.text(), "Hello");
        assert_eq!(
            answer.supporting_content(),
            vec!["tip.pdf: sign orders from the Orders activity"]
        );
    }

    #[tokio::test]
    async fn test_deltas_concatenate_regardless_of_chunk_boundaries() {
        let parts = ["The ", "order ", "must be ", "signed ", "by a provider", "."];
        let mut events = vec![header()];
        events.extend(parts.iter().map(|p| delta(p)));
        let bytes = ndjson(&events);

        for size in [1, 2, 3, 7, 50, bytes.len()] {
            let answer = collect_answer(chunked(bytes.clone(), size)).await.unwrap();
            assert_eq!(answer.text(), parts.concat(), "chunk size {}", size);
        }
    }

    #[tokio::test]
    async fn test_error_event_stops_processing() {
        let bytes = ndjson(&[
            header(),
            delta("partial"),
            json!({"error": "The model is overloaded"}),
            delta(" never merged"),
        ]);
        let mut reader = EventReader::new(chunked(bytes, 16));
        let mut decoder = StreamDecoder::new();

        let mut failure = None;
        while let Some(event) = reader.next_event().await {
            if let Err(e) = decoder.apply(&event.unwrap()) {
                failure = Some(e);
                break;
            }
        }

        assert!(matches!(failure, Some(ChatError::Stream(ref m)) if m == "The model is overloaded"));
        assert_eq!(decoder.state(), DecoderState::Failed);
        assert_eq!(decoder.text(), "partial");
        assert_eq!(decoder.apply(&delta("late")).unwrap(), DecodeStep::Skipped);
        assert_eq!(decoder.text(), "partial");
    }

    #[test]
    fn test_context_merge_is_idempotent() {
        let followups = json!({
            "choices": [{"delta": {"role": "assistant"}, "context": {"followup_questions": ["How do I cosign?"]}}]
        });

        let mut once = StreamDecoder::new();
        once.apply(&header()).unwrap();
        once.apply(&followups).unwrap();

        let mut twice = StreamDecoder::new();
        twice.apply(&header()).unwrap();
        twice.apply(&followups).unwrap();
        assert_eq!(twice.apply(&followups).unwrap(), DecodeStep::ContextMerged);

        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(
            once.snapshot().context.followup_questions(),
            Some(vec!["How do I cosign?".to_string()])
        );
        // Header keys survive the merge
        assert!(once.snapshot().context.has_data_points());
    }

    #[test]
    fn test_latest_header_wins_and_keeps_merged_keys() {
        let mut decoder = StreamDecoder::new();
        decoder.apply(&header()).unwrap();
        decoder
            .apply(&json!({"choices": [{"context": {"followup_questions": ["a?"]}}]}))
            .unwrap();
        let second = json!({"choices": [{
            "delta": {"role": "assistant"},
            "context": {"data_points": {"text": ["other.pdf: newer"]}}
        }]});
        assert_eq!(decoder.apply(&second).unwrap(), DecodeStep::Header);

        let answer = decoder.snapshot();
        assert_eq!(answer.supporting_content(), vec!["other.pdf: newer"]);
        assert_eq!(answer.context.followup_questions(), Some(vec!["a?".to_string()]));
        assert!(answer.context.thoughts().is_some());
    }

    #[test]
    fn test_state_transitions_and_skips() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.state(), DecoderState::AwaitingFirstChunk);

        assert_eq!(decoder.apply(&json!({"object": "ping"})).unwrap(), DecodeStep::Skipped);
        assert_eq!(decoder.state(), DecoderState::Accumulating);

        // Empty content and empty data points are not headers or deltas
        assert_eq!(decoder.apply(&delta("")).unwrap(), DecodeStep::Skipped);
        let empty_points = json!({"choices": [{"delta": {}, "context": {"data_points": []}}]});
        assert_eq!(decoder.apply(&empty_points).unwrap(), DecodeStep::ContextMerged);
        assert!(!decoder.saw_header());

        let answer = decoder.finish().unwrap();
        assert_eq!(decoder.state(), DecoderState::Completed);
        assert_eq!(answer.text(), "");
    }

    #[test]
    fn test_null_or_empty_error_field_is_skipped() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.apply(&json!({"error": null})).unwrap(), DecodeStep::Skipped);
        assert_eq!(decoder.apply(&json!({"error": ""})).unwrap(), DecodeStep::Skipped);
        assert_eq!(decoder.state(), DecoderState::Accumulating);

        assert_eq!(
            decoder.apply(&delta("still going")).unwrap(),
            DecodeStep::Delta("still going".to_string())
        );
        assert_eq!(decoder.finish().unwrap().text(), "still going");
    }

    #[tokio::test]
    async fn test_stream_without_header_is_not_fatal() {
        let bytes = ndjson(&[delta("Just text")]);
        let answer = collect_answer(chunked(bytes, 4)).await.unwrap();
        assert_eq!(answer.text(), "Just text");
        assert_eq!(answer.message.role, "assistant");
        assert!(answer.context.is_empty());
        assert_eq!(answer.session_state, None);
    }

    #[tokio::test]
    async fn test_malformed_line_is_stream_error() {
        let mut bytes = ndjson(&[header()]);
        bytes.extend_from_slice(b"{not json\n");
        let err = collect_answer(chunked(bytes, 32)).await.unwrap_err();
        assert!(matches!(err, ChatError::Stream(_)));
    }

    #[tokio::test]
    async fn test_reader_handles_crlf_blank_lines_and_missing_final_newline() {
        let raw = b"\r\n{\"a\":1}\r\n\n{\"b\":2}".to_vec();
        let mut reader = EventReader::new(chunked(raw, 3));
        assert_eq!(reader.next_event().await.unwrap().unwrap(), json!({"a": 1}));
        assert_eq!(reader.next_event().await.unwrap().unwrap(), json!({"b": 2}));
        assert!(reader.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let chunks: Vec<ChatResult<Vec<u8>>> = vec![
            Ok(b"{\"a\":1}\n".to_vec()),
            Err(ChatError::Network("connection reset".to_string())),
        ];
        let mut reader = EventReader::new(stream::iter(chunks));
        assert!(reader.next_event().await.unwrap().is_ok());
        assert!(matches!(
            reader.next_event().await,
            Some(Err(ChatError::Network(_)))
        ));
        assert!(reader.next_event().await.is_none());
    }
}
