//! Converse responses and stream events.

use anyhow::Result;
use compact_str::CompactString;
use serde::Deserialize;
use serde_json::Value;
use tcore::{
    ActionCall, Content, DeltaContent, DeltaMessage, Message, Role, ToolSpec, Usage,
};

#[derive(Deserialize)]
struct Response {
    output: Output,
    usage: WireUsage,
}

#[derive(Deserialize)]
struct Output {
    message: OutputMessage,
}

#[derive(Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    text: Option<String>,
    tool_use: Option<ToolUse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolUse {
    tool_use_id: CompactString,
    name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage::new(usage.input_tokens, usage.output_tokens)
    }
}

/// One `ConverseStream` event; only the variants the driver uses are
/// decoded, the rest are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEvent {
    content_block_start: Option<BlockStart>,
    content_block_delta: Option<BlockDelta>,
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockStart {
    content_block_index: u32,
    start: Start,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Start {
    tool_use: Option<StartToolUse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartToolUse {
    tool_use_id: CompactString,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockDelta {
    content_block_index: u32,
    delta: Delta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Delta {
    text: Option<String>,
    tool_use: Option<DeltaToolUse>,
}

#[derive(Deserialize)]
struct DeltaToolUse {
    input: String,
}

#[derive(Deserialize)]
struct Metadata {
    usage: WireUsage,
}

/// Convert a `Converse` response into an assistant message.
pub fn response_message(response: Value, tools: &[ToolSpec]) -> Result<Message> {
    let response: Response = serde_json::from_value(response)?;
    let content = response
        .output
        .message
        .content
        .into_iter()
        .filter_map(|block| {
            if let Some(text) = block.text {
                return Some(Content::Text { text });
            }
            block.tool_use.map(|tool_use| {
                let (name, path) = ToolSpec::find(tools, &tool_use.name);
                Content::ActionCall(ActionCall {
                    tag: tool_use.tool_use_id,
                    name,
                    path,
                    input: tool_use.input,
                })
            })
        })
        .collect();

    Ok(Message::new(Role::Assistant, content).with_usage(response.usage.into()))
}

/// Convert a stream event into a delta, if it carries one.
pub fn stream_delta(event: Value, tools: &[ToolSpec]) -> Result<Option<DeltaMessage>> {
    let event: StreamEvent = serde_json::from_value(event)?;

    if let Some(start) = event.content_block_start {
        return Ok(start.start.tool_use.map(|tool_use| {
            let (name, path) = ToolSpec::find(tools, &tool_use.name);
            DeltaMessage {
                content: Some(DeltaContent::Action {
                    index: start.content_block_index,
                    tag: Some(tool_use.tool_use_id),
                    name: Some(name),
                    path: Some(path),
                    partial_input: None,
                }),
                ..Default::default()
            }
        }));
    }

    if let Some(block) = event.content_block_delta {
        let index = block.content_block_index;
        if let Some(text) = block.delta.text {
            return Ok(Some(DeltaMessage::text(index, text)));
        }
        return Ok(block.delta.tool_use.map(|tool_use| DeltaMessage {
            content: Some(DeltaContent::Action {
                index,
                tag: None,
                name: None,
                path: None,
                partial_input: Some(tool_use.input),
            }),
            ..Default::default()
        }));
    }

    Ok(event
        .metadata
        .map(|metadata| DeltaMessage::usage(metadata.usage.into())))
}
