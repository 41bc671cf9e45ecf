//! A chat window: conversation, settings and the request lifecycle.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::answer_parser::parse_answer;
use crate::auth::TokenProviderRef;
use crate::client::{ChatBackend, ChatReply};
use crate::config::ChatConfig;
use crate::conversation::{ConversationStore, Ticket, Turn};
use crate::errors::{ChatError, ChatResult};
use crate::filters::FilterState;
use crate::request::assemble_request;
use crate::selection::{AnalysisTab, SelectionState};
use crate::stream::{ByteStream, DecodeStep, EventReader, StreamDecoder};
use crate::types::{Answer, BackendConfig};

/// Result of one `pump` step
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Retrieved documents arrived
    Header,
    /// The visible answer text grew
    Updated,
    ContextMerged,
    /// An event was read but changed nothing
    Skipped,
    /// The answer was appended to the conversation
    Done,
    /// The request failed; see [`ChatSession::last_error`]
    Failed,
    /// The conversation was cleared or another request was started
    Superseded,
}

impl Progress {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Progress::Done | Progress::Failed | Progress::Superseded)
    }
}

enum Reply {
    Complete(Option<Answer>),
    Streaming {
        reader: EventReader<ByteStream>,
        decoder: StreamDecoder,
    },
}

/// A submitted request whose reply has not been fully consumed
pub struct InFlight {
    ticket: Ticket,
    question: String,
    reply: Reply,
    finished: bool,
}

impl InFlight {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Owns all state of one chat window and is its only writer
pub struct ChatSession<B: ChatBackend> {
    id: Uuid,
    backend: B,
    tokens: TokenProviderRef,
    conversation: ConversationStore,
    selection: SelectionState,
    pub filters: FilterState,
    stream: bool,
    delta_delay: Duration,
    backend_config: BackendConfig,
    last_question: Option<String>,
    last_error: Option<ChatError>,
    is_loading: bool,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, tokens: TokenProviderRef, config: &ChatConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(conversation = %id, "Created chat session");
        Self {
            id,
            backend,
            tokens,
            conversation: ConversationStore::new(),
            selection: SelectionState::new(),
            filters: config.initial_filters(),
            stream: config.stream(),
            delta_delay: config.delta_delay(),
            backend_config: BackendConfig::default(),
            last_question: None,
            last_error: None,
            is_loading: false,
        }
    }

    /// Fetch the backend's feature flags. On failure the defaults stay in place.
    pub async fn load_backend_config(&mut self) -> ChatResult<BackendConfig> {
        let token = self.tokens.get_token().await;
        let config = self.backend.config(token.as_deref()).await?;
        info!(show_image_options = config.show_image_options, "Loaded backend config");
        self.backend_config = config;
        Ok(config)
    }

    /// Send `question`. Returns `None` when the request failed before any
    /// reply arrived; the error is then available from `last_error()`.
    #[instrument(skip(self, question), fields(conversation = %self.id))]
    pub async fn submit(&mut self, question: &str) -> Option<InFlight> {
        self.last_question = Some(question.to_string());
        self.last_error = None;
        self.is_loading = true;
        self.selection.reset_panel();

        let ticket = self.conversation.issue_ticket();
        let token = self.tokens.get_token().await;
        let request = assemble_request(
            self.conversation.turns(),
            question,
            self.filters.build_overrides(),
            self.stream,
        );
        debug!(
            generation = ticket.generation(),
            messages = request.messages.len(),
            "Submitting question"
        );

        let result = self.backend.chat(&request, token.as_deref()).await;
        if !self.conversation.is_current(ticket) {
            debug!(generation = ticket.generation(), "Reply arrived for a superseded request");
            return None;
        }

        match result {
            Ok(ChatReply::Complete(answer)) => Some(InFlight {
                ticket,
                question: question.to_string(),
                reply: Reply::Complete(Some(answer)),
                finished: false,
            }),
            Ok(ChatReply::Stream(body)) => Some(InFlight {
                ticket,
                question: question.to_string(),
                reply: Reply::Streaming {
                    reader: EventReader::new(body),
                    decoder: StreamDecoder::new(),
                },
                finished: false,
            }),
            Err(e) => {
                self.fail(ticket, e);
                None
            }
        }
    }

    /// Consume one event of `inflight` and apply it to the conversation
    pub async fn pump(&mut self, inflight: &mut InFlight) -> Progress {
        if inflight.finished {
            return Progress::Done;
        }
        let ticket = inflight.ticket;

        match &mut inflight.reply {
            Reply::Complete(answer) => {
                inflight.finished = true;
                if !self.conversation.is_current(ticket) {
                    return Progress::Superseded;
                }
                let answer = answer.take().unwrap_or_default();
                self.conversation
                    .append_final(ticket, &inflight.question, answer);
                self.is_loading = false;
                Progress::Done
            }
            Reply::Streaming { reader, decoder } => {
                let event = reader.next_event().await;
                if !self.conversation.is_current(ticket) {
                    inflight.finished = true;
                    return Progress::Superseded;
                }

                let event = match event {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        inflight.finished = true;
                        self.fail(ticket, e);
                        return Progress::Failed;
                    }
                    None => {
                        inflight.finished = true;
                        return match decoder.finish() {
                            Ok(answer) => {
                                self.conversation
                                    .append_final(ticket, &inflight.question, answer);
                                self.is_loading = false;
                                Progress::Done
                            }
                            Err(e) => {
                                self.fail(ticket, e);
                                Progress::Failed
                            }
                        };
                    }
                };

                match decoder.apply(&event) {
                    Ok(DecodeStep::Delta(_)) => {
                        self.is_loading = false;
                        self.conversation.append_streaming(
                            ticket,
                            &inflight.question,
                            decoder.snapshot(),
                        );
                        if !self.delta_delay.is_zero() {
                            tokio::time::sleep(self.delta_delay).await;
                        }
                        Progress::Updated
                    }
                    Ok(DecodeStep::Header) => Progress::Header,
                    Ok(DecodeStep::ContextMerged) => Progress::ContextMerged,
                    Ok(DecodeStep::Skipped) => Progress::Skipped,
                    Err(e) => {
                        inflight.finished = true;
                        self.fail(ticket, e);
                        Progress::Failed
                    }
                }
            }
        }
    }

    /// Submit `question` and pump it to the end, calling `observer` after every step
    pub async fn ask<F>(&mut self, question: &str, mut observer: F) -> Progress
    where
        F: FnMut(&Self, &Progress),
    {
        let Some(mut inflight) = self.submit(question).await else {
            let progress = if self.last_error.is_some() {
                Progress::Failed
            } else {
                Progress::Superseded
            };
            observer(&*self, &progress);
            return progress;
        };

        loop {
            let progress = self.pump(&mut inflight).await;
            observer(&*self, &progress);
            if progress.is_terminal() {
                return progress;
            }
        }
    }

    /// Ask the last question again
    pub async fn retry<F>(&mut self, observer: F) -> Option<Progress>
    where
        F: FnMut(&Self, &Progress),
    {
        let question = self.last_question.clone()?;
        Some(self.ask(&question, observer).await)
    }

    fn fail(&mut self, ticket: Ticket, error: ChatError) {
        warn!(generation = ticket.generation(), "Chat request failed: {}", error);
        self.conversation.abandon(ticket);
        self.last_error = Some(error);
        self.is_loading = false;
        self.clamp_selection();
    }

    /// Close the panel if it points past the turns that are left
    fn clamp_selection(&mut self) {
        let len = self.conversation.visible_len();
        if self.selection.selected_turn >= len {
            debug!(
                selected = self.selection.selected_turn,
                len, "Closing panel on a dropped turn"
            );
            self.selection.reset_panel();
            self.selection.selected_turn = len.saturating_sub(1);
        }
    }

    /// Start over. Replies still arriving for earlier requests are ignored.
    pub fn clear(&mut self) {
        info!(conversation = %self.id, "Clearing conversation");
        self.conversation.clear();
        self.selection.clear();
        self.last_question = None;
        self.last_error = None;
        self.is_loading = false;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn backend_config(&self) -> BackendConfig {
        self.backend_config
    }

    pub fn last_question(&self) -> Option<&str> {
        self.last_question.as_deref()
    }

    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    /// True from submission until the first text arrives or the request ends
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_streaming(&self) -> bool {
        self.conversation.is_streaming()
    }

    pub fn stream(&self) -> bool {
        self.stream
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.stream = stream;
    }

    pub fn turn(&self, index: usize) -> ChatResult<&Turn> {
        self.conversation.get(index).ok_or(ChatError::InvalidTurn {
            index,
            len: self.conversation.visible_len(),
        })
    }

    pub fn toggle_tab(&mut self, tab: AnalysisTab, index: usize) -> ChatResult<()> {
        self.turn(index)?;
        self.selection.toggle_tab(tab, index);
        Ok(())
    }

    pub fn show_citation(&mut self, citation: &str, index: usize) -> ChatResult<()> {
        self.turn(index)?;
        self.selection.show_citation(citation, index);
        Ok(())
    }

    /// Follow-ups for a turn: the backend's list if it sent one, otherwise
    /// the `<<question>>` markers in the text
    pub fn followup_questions(&self, index: usize) -> ChatResult<Vec<String>> {
        let turn = self.turn(index)?;
        if let Some(questions) = turn.answer.context.followup_questions() {
            return Ok(questions);
        }
        let streaming = self.is_streaming() && index + 1 == self.conversation.visible_len();
        Ok(parse_answer(turn.answer.text(), streaming).followup_questions)
    }
}
