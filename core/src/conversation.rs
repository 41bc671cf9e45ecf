//! Ordered conversation turns and the stale-stream guard.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Answer;

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: Answer,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: Answer) -> Self {
        Self {
            question: question.into(),
            answer,
        }
    }
}

/// The authoritative list of turns.
///
/// While a stream is running the finalized turns are kept apart from the
/// growing tail, so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationView {
    Finalized(Vec<Turn>),
    Streaming { turns: Vec<Turn>, tail: Turn },
}

impl Default for ConversationView {
    fn default() -> Self {
        ConversationView::Finalized(Vec::new())
    }
}

impl ConversationView {
    fn turns(&self) -> &[Turn] {
        match self {
            ConversationView::Finalized(turns) => turns,
            ConversationView::Streaming { turns, .. } => turns,
        }
    }

    fn into_turns(self) -> Vec<Turn> {
        match self {
            ConversationView::Finalized(turns) => turns,
            ConversationView::Streaming { turns, .. } => turns,
        }
    }
}

/// Write permission for one request. Only the most recently issued ticket is
/// honoured; `clear()` and newer tickets invalidate older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Conversation state for one chat window
#[derive(Debug, Default)]
pub struct ConversationStore {
    view: ConversationView,
    generation: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Any partial tail from an older request is dropped.
    pub fn issue_ticket(&mut self) -> Ticket {
        self.generation += 1;
        if self.is_streaming() {
            debug!("Discarding partial answer from superseded request");
            self.view = ConversationView::Finalized(std::mem::take(&mut self.view).into_turns());
        }
        Ticket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }

    /// Show `answer` as the in-progress tail. Returns `false` for a stale ticket.
    pub fn append_streaming(&mut self, ticket: Ticket, question: &str, answer: Answer) -> bool {
        if !self.is_current(ticket) {
            debug!(generation = ticket.generation, "Ignoring update from stale stream");
            return false;
        }
        let tail = Turn::new(question, answer);
        if let ConversationView::Streaming { tail: current, .. } = &mut self.view {
            *current = tail;
        } else {
            let turns = std::mem::take(&mut self.view).into_turns();
            self.view = ConversationView::Streaming { turns, tail };
        }
        true
    }

    /// Append a finished turn. Returns `false` for a stale ticket.
    pub fn append_final(&mut self, ticket: Ticket, question: &str, answer: Answer) -> bool {
        if !self.is_current(ticket) {
            debug!(generation = ticket.generation, "Ignoring answer from stale request");
            return false;
        }
        let mut turns = std::mem::take(&mut self.view).into_turns();
        turns.push(Turn::new(question, answer));
        self.view = ConversationView::Finalized(turns);
        true
    }

    /// Drop the partial tail of a failed request, leaving earlier turns as they were
    pub fn abandon(&mut self, ticket: Ticket) {
        if self.is_current(ticket) && self.is_streaming() {
            self.view = ConversationView::Finalized(std::mem::take(&mut self.view).into_turns());
        }
    }

    /// Empty the conversation and invalidate every outstanding ticket
    pub fn clear(&mut self) {
        self.generation += 1;
        self.view = ConversationView::default();
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.view, ConversationView::Streaming { .. })
    }

    /// Finalized turns only; never contains partially streamed text
    pub fn turns(&self) -> &[Turn] {
        self.view.turns()
    }

    /// Everything that should be rendered, including the streaming tail
    pub fn visible(&self) -> Vec<&Turn> {
        match &self.view {
            ConversationView::Finalized(turns) => turns.iter().collect(),
            ConversationView::Streaming { turns, tail } => {
                turns.iter().chain(std::iter::once(tail)).collect()
            }
        }
    }

    pub fn visible_len(&self) -> usize {
        self.turns().len() + usize::from(self.is_streaming())
    }

    pub fn is_empty(&self) -> bool {
        self.visible_len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.visible().get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseMessage;

    fn answer(text: &str) -> Answer {
        Answer {
            message: ResponseMessage {
                content: text.to_string(),
                role: "assistant".to_string(),
            },
            ..Answer::default()
        }
    }

    #[test]
    fn test_streaming_replaces_tail() {
        let mut store = ConversationStore::new();
        let ticket = store.issue_ticket();

        assert!(store.append_streaming(ticket, "q1", answer("He")));
        assert!(store.append_streaming(ticket, "q1", answer("Hello")));
        assert!(store.is_streaming());
        assert_eq!(store.visible_len(), 1);
        assert_eq!(store.get(0).unwrap().answer.text(), "Hello");
        // The finalized list never sees partial text
        assert!(store.turns().is_empty());

        assert!(store.append_final(ticket, "q1", answer("Hello!")));
        assert!(!store.is_streaming());
        assert_eq!(store.turns().len(), 1);
        assert_eq!(store.turns()[0].answer.text(), "Hello!");
    }

    #[test]
    fn test_prior_turns_untouched_while_streaming() {
        let mut store = ConversationStore::new();
        let first = store.issue_ticket();
        store.append_final(first, "q1", answer("a1"));
        let before = store.turns().to_vec();

        let second = store.issue_ticket();
        store.append_streaming(second, "q2", answer("partial"));
        assert_eq!(store.turns(), before.as_slice());
        assert_eq!(store.visible().len(), 2);

        store.abandon(second);
        assert!(!store.is_streaming());
        assert_eq!(store.turns(), before.as_slice());
    }

    #[test]
    fn test_clear_while_streaming_rejects_late_events() {
        let mut store = ConversationStore::new();
        let ticket = store.issue_ticket();
        store.append_streaming(ticket, "q", answer("par"));

        store.clear();
        assert!(store.is_empty());
        assert!(!store.is_current(ticket));

        assert!(!store.append_streaming(ticket, "q", answer("partial")));
        assert!(!store.append_final(ticket, "q", answer("partial answer")));
        assert!(store.is_empty());
        assert_eq!(store.view(), &ConversationView::Finalized(Vec::new()));
    }

    #[test]
    fn test_new_ticket_supersedes_old_stream() {
        let mut store = ConversationStore::new();
        let old = store.issue_ticket();
        store.append_streaming(old, "old", answer("o"));

        let new = store.issue_ticket();
        assert!(!store.is_streaming());
        assert!(!store.append_streaming(old, "old", answer("ol")));
        assert!(store.append_final(new, "new", answer("n")));
        assert_eq!(store.turns().len(), 1);
        assert_eq!(store.turns()[0].question, "new");
    }
}
