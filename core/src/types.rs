use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Role of a message in the chat transcript sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Opaque server state carried from one response into the next request
    History,
}

/// One entry of the request transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub content: Value,
    pub role: Role,
}

impl RequestMessage {
    pub fn user(content: &str) -> Self {
        Self {
            content: Value::String(content.to_string()),
            role: Role::User,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            content: Value::String(content.to_string()),
            role: Role::Assistant,
        }
    }

    pub fn history(content: Value) -> Self {
        Self {
            content,
            role: Role::History,
        }
    }
}

/// How documents are retrieved for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    Vectors,
    Text,
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hybrid" => Ok(RetrievalMode::Hybrid),
            "vectors" | "vector" => Ok(RetrievalMode::Vectors),
            "text" => Ok(RetrievalMode::Text),
            other => Err(format!("unknown retrieval mode '{}'", other)),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalMode::Hybrid => "hybrid",
            RetrievalMode::Vectors => "vectors",
            RetrievalMode::Text => "text",
        };
        f.write_str(name)
    }
}

/// Index fields searched in vector mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorField {
    Embedding,
    ImageEmbedding,
}

/// Which inputs are sent to an image-capable model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageInputMode {
    #[default]
    TextAndImages,
    Images,
    Texts,
}

/// Retrieval and prompt settings sent with every chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    /// Comma-joined categories to exclude
    pub include_category: String,
    /// Comma-joined versions to include
    pub include_version: String,
    /// Pipe-joined audiences to include
    pub include_audience: String,
    pub top: u32,
    pub retrieval_mode: RetrievalMode,
    pub semantic_ranker: bool,
    pub semantic_captions: bool,
    pub suggest_followup_questions: bool,
    pub use_oid_security_filter: bool,
    pub use_groups_security_filter: bool,
    pub vector_fields: Vec<VectorField>,
    #[serde(rename = "use_gpt4v")]
    pub use_images: bool,
    #[serde(rename = "gpt4v_input")]
    pub image_input_mode: ImageInputMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub overrides: RequestOverrides,
}

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<RequestMessage>,
    pub stream: bool,
    pub context: RequestContext,
    /// Always serialized, `null` on the first turn
    pub session_state: Option<Value>,
}

fn default_role() -> String {
    "assistant".to_string()
}

/// The assistant message of an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_role")]
    pub role: String,
}

impl Default for ResponseMessage {
    fn default() -> Self {
        Self {
            content: String::new(),
            role: default_role(),
        }
    }
}

/// Auxiliary answer metadata: retrieved documents, thought process,
/// follow-up questions and the opaque history value.
///
/// Kept as a JSON object so that streamed context events can be merged key
/// by key without knowing every key the server may send.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerContext(Map<String, Value>);

impl AnswerContext {
    pub const DATA_POINTS: &'static str = "data_points";
    pub const THOUGHTS: &'static str = "thoughts";
    pub const FOLLOWUP_QUESTIONS: &'static str = "followup_questions";
    pub const HISTORY: &'static str = "history";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: keys from `other` are added or overwrite ours, none are removed
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn data_points(&self) -> Option<&Value> {
        self.0.get(Self::DATA_POINTS)
    }

    pub fn has_data_points(&self) -> bool {
        self.data_points().is_some_and(is_non_empty)
    }

    pub fn thoughts(&self) -> Option<&Value> {
        self.0.get(Self::THOUGHTS)
    }

    pub fn followup_questions(&self) -> Option<Vec<String>> {
        let list = self.0.get(Self::FOLLOWUP_QUESTIONS)?.as_array()?;
        Some(
            list.iter()
                .filter_map(|q| q.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// History value to resend verbatim; `null` when the server sent none
    pub fn history(&self) -> Value {
        self.0.get(Self::HISTORY).cloned().unwrap_or(Value::Null)
    }
}

impl From<Map<String, Value>> for AnswerContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// `null`, `""`, `[]` and `{}` count as empty
pub(crate) fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// One step of the backend's thought process trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub title: String,
    #[serde(default)]
    pub description: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

/// A complete (or in-progress) answer to one question
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(default)]
    pub context: AnswerContext,
    #[serde(default)]
    pub session_state: Option<Value>,
}

impl Answer {
    pub fn text(&self) -> &str {
        &self.message.content
    }

    /// Retrieved document snippets as display strings.
    ///
    /// Accepts both `{"text": [..]}` and a bare array of records.
    pub fn supporting_content(&self) -> Vec<String> {
        let items = match self.context.data_points() {
            Some(Value::Object(map)) => map.get("text").and_then(Value::as_array),
            Some(Value::Array(items)) => Some(items),
            _ => None,
        };
        items
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Thought process steps, if the trace has the usual shape
    pub fn thought_steps(&self) -> Vec<ThoughtStep> {
        self.context
            .thoughts()
            .and_then(|thoughts| serde_json::from_value(thoughts.clone()).ok())
            .unwrap_or_default()
    }
}

/// Non-streaming response body of `POST /chat`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatAppResponse {
    pub choices: Vec<Answer>,
}

impl ChatAppResponse {
    pub fn into_answer(self) -> Option<Answer> {
        self.choices.into_iter().next()
    }
}

/// Response of `GET /config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "showGPT4VOptions", default)]
    pub show_image_options: bool,
}
