//! Chat completions responses and stream chunks.

use compact_str::CompactString;
use serde::Deserialize;
use serde_json::Value;
use tcore::{
    ActionCall, Content, DeltaContent, DeltaMessage, Message, Role, ToolSpec, Usage,
};

/// A non-streaming chat completions response.
#[derive(Debug, Deserialize)]
pub struct Response {
    /// The completion choices.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token usage.
    pub usage: Option<WireUsage>,
}

/// A completion choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: WireMessage,
}

/// A generated message.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    /// Text content.
    pub content: Option<String>,
    /// Tool calls.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// A tool call, complete or partial.
#[derive(Debug, Default, Deserialize)]
pub struct ToolCall {
    /// Position of the call, streaming only.
    #[serde(default)]
    pub index: u32,
    /// Call id.
    pub id: Option<CompactString>,
    /// The function invocation.
    #[serde(default)]
    pub function: FunctionCall,
}

/// The function part of a tool call.
#[derive(Debug, Default, Deserialize)]
pub struct FunctionCall {
    /// Function wire name.
    pub name: Option<String>,
    /// JSON encoded arguments, possibly partial.
    pub arguments: Option<String>,
}

/// Token usage on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    /// Prompt tokens.
    pub prompt_tokens: u32,
    /// Completion tokens.
    pub completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

impl Response {
    /// Convert the first choice into an assistant message.
    pub fn into_message(self, tools: &[ToolSpec]) -> anyhow::Result<Message> {
        let Some(choice) = self.choices.into_iter().next() else {
            anyhow::bail!("completion returned no choices");
        };

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(Content::Text { text });
        }
        for call in choice.message.tool_calls {
            let wire = call.function.name.unwrap_or_default();
            let (name, path) = ToolSpec::find(tools, &wire);
            let arguments = call.function.arguments.unwrap_or_default();
            content.push(Content::ActionCall(ActionCall {
                tag: call.id.unwrap_or_default(),
                name,
                path,
                input: parse_arguments(&arguments),
            }));
        }

        let usage = self.usage.map(Usage::from).unwrap_or_default();
        Ok(Message::new(Role::Assistant, content).with_usage(usage))
    }
}

/// A streamed chat completions chunk.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    /// Choice deltas.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, present on the final chunk when requested.
    pub usage: Option<WireUsage>,
}

/// The delta of one choice.
#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    /// The delta.
    #[serde(default)]
    pub delta: Delta,
}

/// Incremental message content.
#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    /// Text fragment.
    pub content: Option<String>,
    /// Tool call fragments.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl StreamChunk {
    /// Map the chunk onto deltas.
    ///
    /// Text sits at content index 0 and tool call `i` at index `i + 1`.
    pub fn into_deltas(self, tools: &[ToolSpec]) -> Vec<DeltaMessage> {
        let mut out = Vec::new();
        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(DeltaMessage::text(0, text));
            }
            for call in choice.delta.tool_calls {
                let (name, path) = match call.function.name.as_deref() {
                    Some(wire) => {
                        let (name, path) = ToolSpec::find(tools, wire);
                        (Some(name), Some(path))
                    }
                    None => (None, None),
                };
                out.push(DeltaMessage {
                    content: Some(DeltaContent::Action {
                        index: call.index + 1,
                        tag: call.id,
                        name,
                        path,
                        partial_input: call.function.arguments,
                    }),
                    ..Default::default()
                });
            }
        }
        if let Some(usage) = self.usage {
            out.push(DeltaMessage::usage(usage.into()));
        }
        out
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
