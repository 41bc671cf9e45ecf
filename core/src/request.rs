use crate::conversation::Turn;
use crate::types::{ChatRequest, RequestContext, RequestMessage, RequestOverrides};

/// Builds the chat request for `question` on top of the prior turns.
///
/// Each prior turn contributes its question, the assistant text and the
/// server's `history` value exactly as received. The session state of the
/// last answer is forwarded unchanged.
pub fn assemble_request(
    turns: &[Turn],
    question: &str,
    overrides: RequestOverrides,
    stream: bool,
) -> ChatRequest {
    let mut messages: Vec<RequestMessage> = turns
        .iter()
        .flat_map(|turn| {
            [
                RequestMessage::user(&turn.question),
                RequestMessage::assistant(turn.answer.text()),
                RequestMessage::history(turn.answer.context.history()),
            ]
        })
        .collect();
    messages.push(RequestMessage::user(question));

    let session_state = turns
        .last()
        .and_then(|turn| turn.answer.session_state.clone());

    ChatRequest {
        messages,
        stream,
        context: RequestContext { overrides },
        session_state,
    }
}
