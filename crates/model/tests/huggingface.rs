//! Tests for the HuggingFace pipeline driver.

use anyhow::Result;
use futures_util::StreamExt;
use tcore::{Content, Image, Message, PromptStack, Role, Usage};
use trellis_model::{
    ChatMessage, GenerationParams, HuggingFacePipelineDriver, PromptDriver, TextGenerationPipeline,
};

/// Echoes the last message back and tokenizes one token per word.
struct EchoPipeline {
    choices: usize,
}

impl TextGenerationPipeline for EchoPipeline {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Vec<Vec<ChatMessage>>> {
        assert_eq!(params.max_new_tokens, 250);
        assert!(params.do_sample);
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let mut conversation = messages.to_vec();
        conversation.push(ChatMessage {
            role: "assistant".into(),
            content: format!("echo {last}"),
        });
        Ok(vec![conversation; self.choices])
    }

    fn apply_chat_template(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
    ) -> Result<Vec<u32>> {
        let text = messages
            .iter()
            .map(|m| format!("<{}> {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join(" ");
        let mut tokens = self.encode(&text)?;
        if add_generation_prompt {
            tokens.push(0);
        }
        Ok(tokens)
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        Ok(format!("{} tokens", tokens.len()))
    }
}

fn driver(choices: usize) -> HuggingFacePipelineDriver<EchoPipeline> {
    HuggingFacePipelineDriver::new(EchoPipeline { choices }, "HuggingFaceH4/zephyr-7b-beta")
}

fn stack() -> PromptStack {
    let mut stack = PromptStack::new();
    stack.add_system("be nice").add_user("hello world");
    stack
}

#[tokio::test]
async fn try_run_returns_last_generated_message() {
    let message = driver(1).try_run(&stack()).await.unwrap();
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.text(), "echo hello world");
    // "<system> be nice <user> hello world" + generation prompt
    assert_eq!(message.usage, Usage::new(7, 3));
}

#[tokio::test]
async fn multiple_choices_rejected() {
    let err = driver(2).try_run(&stack()).await.unwrap_err();
    assert_eq!(err.to_string(), "completion with more than one choice is not supported yet");
}

#[tokio::test]
async fn empty_completion_rejected() {
    let err = driver(0).try_run(&stack()).await.unwrap_err();
    assert_eq!(err.to_string(), "pipeline returned no completions");
}

#[tokio::test]
async fn content_shape_validated() {
    let mut stack = PromptStack::new();
    stack.add_message(Message::new(
        Role::User,
        vec![Content::text("a"), Content::text("b")],
    ));
    let err = driver(1).try_run(&stack).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid input content length.");

    let mut stack = PromptStack::new();
    stack.add_message(Message::new(
        Role::User,
        vec![Content::Image(Image::new("png", vec![], 1, 1))],
    ));
    let err = driver(1).try_run(&stack).await.unwrap_err();
    assert_eq!(err.to_string(), "Unsupported content type");
}

#[tokio::test]
async fn streaming_unsupported() {
    let driver = driver(1);
    assert!(!driver.stream());
    let items: Vec<_> = driver.try_stream(stack()).collect().await;
    assert_eq!(items[0].as_ref().unwrap_err().to_string(), "streaming is not supported");
}

#[test]
fn tokenizer_and_prompt_string() {
    let driver = driver(1).max_tokens(100);
    assert_eq!(driver.tokenizer().max_output_tokens, 100);
    assert_eq!(driver.tokenizer().max_input_tokens, 4_096);
    assert_eq!(driver.prompt_stack_to_string(&stack()).unwrap(), "7 tokens");
}
