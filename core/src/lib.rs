// Core chat functionality:
// - Backend client and wire types
// - Streaming answer assembly
// - Conversation, selection and settings state
// - Configuration loading
// - Shared error types

// Export client module - HTTP client for the chat backend
pub mod client;
pub use client::{ChatBackend, ChatClient, ChatReply};

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

pub mod answer_parser;
pub mod auth;
pub mod conversation;
pub mod filters;
pub mod request;
pub mod selection;
pub mod session;
pub mod stream;

pub use answer_parser::{parse_answer, Fragment, ParsedAnswer};
pub use auth::{StaticToken, TokenProvider, TokenProviderRef};
pub use conversation::{ConversationStore, ConversationView, Ticket, Turn};
pub use filters::{FilterKind, FilterOption, FilterState};
pub use request::assemble_request;
pub use selection::{AnalysisTab, SelectionState};
pub use session::{ChatSession, InFlight, Progress};
pub use stream::{collect_answer, DecoderState, EventReader, StreamDecoder};
