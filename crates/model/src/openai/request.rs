//! Chat completions request body.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::{Value, json};
use tcore::{Content, Message, PromptStack, Role};

/// OpenAI chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: String,
    /// The messages to send.
    pub messages: Vec<Value>,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Tool choice control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (e.g. include_usage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<Value>,
}

impl Request {
    /// Translate a prompt stack into a request body.
    pub fn new(model: &str, stack: &PromptStack) -> Self {
        let tools = (!stack.tools.is_empty()).then(|| {
            let tools = stack
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.wire_name(),
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect::<Vec<_>>();
            json!(tools)
        });

        Self {
            model: model.to_owned(),
            messages: stack.messages.iter().flat_map(messages).collect(),
            temperature: None,
            max_tokens: None,
            tool_choice: tools.as_ref().map(|_| json!("auto")),
            tools,
            stream: None,
            stream_options: None,
        }
    }

    /// Enable streaming for the request, asking for a final usage chunk.
    pub fn stream(mut self) -> Self {
        self.stream = Some(true);
        self.stream_options = Some(json!({ "include_usage": true }));
        self
    }
}

/// One stack message becomes one or more wire messages.
///
/// Tool results travel as separate `tool` role messages.
fn messages(message: &Message) -> Vec<Value> {
    let mut out = Vec::new();
    let mut parts = Vec::new();
    let mut calls = Vec::new();

    for content in &message.content {
        match content {
            Content::Text { text } => parts.push(json!({ "type": "text", "text": text })),
            Content::Image(image) => parts.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.mime_type(), STANDARD.encode(&image.bytes)),
                },
            })),
            Content::ActionCall(call) => calls.push(json!({
                "id": call.tag,
                "type": "function",
                "function": {
                    "name": call.wire_name(),
                    "arguments": call.input.to_string(),
                },
            })),
            Content::ActionResult(result) => out.push(json!({
                "role": "tool",
                "tool_call_id": result.tag,
                "content": result.output,
            })),
        }
    }

    let text_only = parts.iter().all(|p| p["type"] == "text");
    let content = if parts.is_empty() {
        Value::Null
    } else if text_only {
        Value::String(message.text())
    } else {
        Value::Array(parts)
    };

    if message.role == Role::Assistant && !calls.is_empty() {
        out.push(json!({ "role": "assistant", "content": content, "tool_calls": calls }));
    } else if !content.is_null() || out.is_empty() {
        let content = if content.is_null() { json!("") } else { content };
        out.push(json!({ "role": message.role.as_str(), "content": content }));
    }
    out
}
