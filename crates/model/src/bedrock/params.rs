//! Converse request parameters.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value, json};
use tcore::{Content, Message, PromptStack, Role};

/// Build the Converse parameters for a stack.
///
/// System messages move into `system`; every other message keeps its
/// order, with non-assistant roles sent as `user`.
pub fn converse_params(
    model: &str,
    temperature: f32,
    additional_model_request_fields: &Map<String, Value>,
    stack: &PromptStack,
) -> Value {
    let system = stack
        .system_messages()
        .map(|m| json!({ "text": m.text() }))
        .collect::<Vec<_>>();
    let messages = stack.non_system_messages().map(message).collect::<Vec<_>>();

    let mut params = json!({
        "modelId": model,
        "messages": messages,
        "system": system,
        "inferenceConfig": { "temperature": temperature },
        "additionalModelRequestFields": additional_model_request_fields,
    });

    if !stack.tools.is_empty() {
        let tools = stack
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "toolSpec": {
                        "name": tool.wire_name(),
                        "description": tool.description,
                        "inputSchema": { "json": tool.parameters },
                    }
                })
            })
            .collect::<Vec<_>>();
        params["toolConfig"] = json!({ "tools": tools, "toolChoice": { "auto": {} } });
    }

    params
}

fn message(message: &Message) -> Value {
    let role = match message.role {
        Role::Assistant => "assistant",
        _ => "user",
    };
    let content = message.content.iter().map(block).collect::<Vec<_>>();
    json!({ "role": role, "content": content })
}

fn block(content: &Content) -> Value {
    match content {
        Content::Text { text } => json!({ "text": text }),
        Content::Image(image) => json!({
            "image": {
                "format": image.format,
                "source": { "bytes": STANDARD.encode(&image.bytes) },
            }
        }),
        Content::ActionCall(call) => json!({
            "toolUse": {
                "toolUseId": call.tag,
                "name": call.wire_name(),
                "input": call.input,
            }
        }),
        Content::ActionResult(result) => json!({
            "toolResult": {
                "toolUseId": result.tag,
                "content": [{ "text": result.output }],
                "status": "success",
            }
        }),
    }
}
