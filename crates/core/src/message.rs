//! Role-tagged messages, the prompt stack and streaming deltas.

use crate::ToolSpec;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

/// The role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum Role {
    /// The system role
    #[serde(rename = "system")]
    System,
    /// The user role
    #[serde(rename = "user")]
    #[default]
    User,
    /// The assistant role
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    /// The lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// An image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Image {
    /// Image subtype, e.g. `png` or `jpeg`.
    pub format: CompactString,
    /// Raw encoded image bytes.
    pub bytes: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Image {
    /// Create a new image.
    pub fn new(format: impl Into<CompactString>, bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            format: format.into(),
            bytes,
            width,
            height,
        }
    }

    /// The MIME type, e.g. `image/png`.
    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionCall {
    /// Vendor call id, echoed back with the result.
    pub tag: CompactString,
    /// Tool name.
    pub name: CompactString,
    /// Tool activity.
    pub path: CompactString,
    /// Parsed JSON input.
    pub input: Value,
}

impl ActionCall {
    /// The function name sent to vendors.
    pub fn wire_name(&self) -> String {
        crate::tool::wire_name(&self.name, &self.path)
    }
}

/// The outcome of a tool invocation, sent back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionResult {
    /// Call id of the originating [`ActionCall`].
    pub tag: CompactString,
    /// Tool name.
    pub name: CompactString,
    /// Tool activity.
    pub path: CompactString,
    /// Tool output text.
    pub output: String,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text value.
        text: String,
    },
    /// An image.
    Image(Image),
    /// A tool invocation (assistant messages).
    ActionCall(ActionCall),
    /// A tool result (user messages).
    ActionResult(ActionResult),
}

impl Content {
    /// Create a text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of this content, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Text { text: value }
    }
}

impl From<Image> for Content {
    fn from(value: Image) -> Self {
        Self::Image(value)
    }
}

/// Token usage accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u32,
    /// Tokens produced by the model.
    pub output_tokens: u32,
}

impl Usage {
    /// Create a new usage record.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A message in the prompt stack
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Message {
    /// The role of the message
    pub role: Role,

    /// The content of the message
    pub content: Vec<Content>,

    /// Token usage reported for this message
    #[serde(default)]
    pub usage: Usage,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: Role, content: Vec<Content>) -> Self {
        Self {
            role,
            content,
            usage: Usage::default(),
        }
    }

    /// Create a new system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Content::text(text)])
    }

    /// Create a new user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Content::text(text)])
    }

    /// Create a new assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::text(text)])
    }

    /// Attach usage to the message.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// The concatenated text content of the message.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(Content::as_text).collect()
    }

    /// Tool invocations in this message.
    pub fn action_calls(&self) -> impl Iterator<Item = &ActionCall> {
        self.content.iter().filter_map(|c| match c {
            Content::ActionCall(call) => Some(call),
            _ => None,
        })
    }

    /// Tool results in this message.
    pub fn action_results(&self) -> impl Iterator<Item = &ActionResult> {
        self.content.iter().filter_map(|c| match c {
            Content::ActionResult(result) => Some(result),
            _ => None,
        })
    }

    /// Whether this is a system message
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Whether this is a user message
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Whether this is an assistant message
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// An ordered, append-only sequence of messages handed to a driver.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PromptStack {
    /// The messages, oldest first.
    pub messages: Vec<Message>,

    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl PromptStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tools available to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Append a message.
    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    /// Append a system message.
    pub fn add_system(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_message(Message::system(text))
    }

    /// Append a user message.
    pub fn add_user(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_message(Message::user(text))
    }

    /// Append an assistant message.
    pub fn add_assistant(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_message(Message::assistant(text))
    }

    /// System messages, in order.
    pub fn system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_system())
    }

    /// Every message that is not a system message, in order.
    pub fn non_system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }

    /// A plain-text rendering used for token estimates.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.text()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A streamed fragment of a message
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct DeltaMessage {
    /// The role, when the vendor reports it
    pub role: Option<Role>,

    /// The content delta
    pub content: Option<DeltaContent>,

    /// Usage, usually only on the final fragment
    pub usage: Option<Usage>,
}

impl DeltaMessage {
    /// A text delta at the given content index.
    pub fn text(index: u32, text: impl Into<String>) -> Self {
        Self {
            content: Some(DeltaContent::Text {
                index,
                text: text.into(),
            }),
            ..Default::default()
        }
    }

    /// A usage-only delta.
    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }
}

/// Content carried by a [`DeltaMessage`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaContent {
    /// A fragment of text.
    Text {
        /// Content block index.
        index: u32,
        /// The text fragment.
        text: String,
    },
    /// A fragment of a tool invocation.
    Action {
        /// Content block index.
        index: u32,
        /// Vendor call id, usually only on the first fragment.
        tag: Option<CompactString>,
        /// Tool name, usually only on the first fragment.
        name: Option<CompactString>,
        /// Tool activity, usually only on the first fragment.
        path: Option<CompactString>,
        /// A fragment of the JSON input.
        partial_input: Option<String>,
    },
}

impl DeltaContent {
    /// Content block index of this delta.
    pub fn index(&self) -> u32 {
        match self {
            Self::Text { index, .. } | Self::Action { index, .. } => *index,
        }
    }
}

/// A content block under construction.
enum Block {
    Text(String),
    Action {
        tag: CompactString,
        name: CompactString,
        path: CompactString,
        input: String,
    },
}

/// Folds streamed deltas back into a complete [`Message`].
pub struct MessageBuilder {
    role: Role,
    blocks: BTreeMap<u32, Block>,
    usage: Usage,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new(role: Role) -> Self {
        Self {
            role,
            blocks: BTreeMap::new(),
            usage: Usage::default(),
        }
    }

    /// Accept a delta from the stream, returns whether it carried text.
    pub fn accept(&mut self, delta: &DeltaMessage) -> bool {
        if let Some(role) = delta.role {
            self.role = role;
        }
        if let Some(usage) = delta.usage {
            self.usage += usage;
        }

        match &delta.content {
            Some(DeltaContent::Text { index, text }) => {
                match self.blocks.get_mut(index) {
                    Some(Block::Text(buf)) => buf.push_str(text),
                    _ => {
                        self.blocks.insert(*index, Block::Text(text.clone()));
                    }
                }
                !text.is_empty()
            }
            Some(DeltaContent::Action {
                index,
                tag,
                name,
                path,
                partial_input,
            }) => {
                let block = self.blocks.entry(*index).or_insert_with(|| Block::Action {
                    tag: CompactString::default(),
                    name: CompactString::default(),
                    path: CompactString::default(),
                    input: String::new(),
                });
                if let Block::Text(_) = block {
                    *block = Block::Action {
                        tag: CompactString::default(),
                        name: CompactString::default(),
                        path: CompactString::default(),
                        input: String::new(),
                    };
                }
                if let Block::Action {
                    tag: t,
                    name: n,
                    path: p,
                    input,
                } = block
                {
                    if let Some(tag) = tag {
                        *t = tag.clone();
                    }
                    if let Some(name) = name {
                        *n = name.clone();
                    }
                    if let Some(path) = path {
                        *p = path.clone();
                    }
                    if let Some(partial) = partial_input {
                        input.push_str(partial);
                    }
                }
                false
            }
            None => false,
        }
    }

    /// Build the message
    pub fn build(self) -> Message {
        let content = self
            .blocks
            .into_values()
            .map(|block| match block {
                Block::Text(text) => Content::Text { text },
                Block::Action {
                    tag,
                    name,
                    path,
                    input,
                } => Content::ActionCall(ActionCall {
                    tag,
                    name,
                    path,
                    input: parse_input(&input),
                }),
            })
            .collect();

        Message {
            role: self.role,
            content,
            usage: self.usage,
        }
    }
}

/// Parse accumulated tool input, keeping malformed JSON as a string.
fn parse_input(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
