//! HuggingFace text-generation pipeline driver.
//!
//! Inference runs in whatever hosts the pipeline; this crate only sees it
//! through [`TextGenerationPipeline`].

use crate::PromptDriver;
use anyhow::{Result, anyhow, bail};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use tcore::{
    Content, DeltaMessage, Message, PromptStack, Tokenizer, Usage, default_context_limit,
};

/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: usize = 250;

/// A chat message as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role name.
    pub role: String,
    /// The text content.
    pub content: String,
}

/// Generation parameters forwarded to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Maximum number of new tokens.
    pub max_new_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to sample.
    pub do_sample: bool,
    /// Extra model parameters.
    pub extra: Map<String, Value>,
}

/// A text-generation pipeline and its tokenizer.
pub trait TextGenerationPipeline: Send + Sync + 'static {
    /// Generate completions, one conversation per returned choice, each
    /// ending with the generated assistant message.
    fn generate(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> impl Future<Output = Result<Vec<Vec<ChatMessage>>>> + Send;

    /// Tokenize messages through the model's chat template.
    fn apply_chat_template(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
    ) -> Result<Vec<u32>>;

    /// Tokenize plain text.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Detokenize.
    fn decode(&self, tokens: &[u32]) -> Result<String>;
}

/// Driver over a local text-generation pipeline. Never streams.
pub struct HuggingFacePipelineDriver<P> {
    pipeline: P,
    model: String,
    max_tokens: usize,
    temperature: f32,
    params: Map<String, Value>,
}

impl<P: TextGenerationPipeline> HuggingFacePipelineDriver<P> {
    /// Create a driver for a HuggingFace Hub model name.
    pub fn new(pipeline: P, model: &str) -> Self {
        Self {
            pipeline,
            model: model.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.1,
            params: Map::new(),
        }
    }

    /// Cap the completion length.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Extra model run parameters.
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Render the stack through the chat template and back into text.
    pub fn prompt_stack_to_string(&self, stack: &PromptStack) -> Result<String> {
        let tokens = self.prompt_stack_to_tokens(stack)?;
        self.pipeline.decode(&tokens)
    }

    fn prompt_stack_to_tokens(&self, stack: &PromptStack) -> Result<Vec<u32>> {
        let messages = chat_messages(stack)?;
        self.pipeline.apply_chat_template(&messages, true)
    }
}

impl<P: TextGenerationPipeline> PromptDriver for HuggingFacePipelineDriver<P> {
    fn model(&self) -> &str {
        &self.model
    }

    fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(default_context_limit(&self.model), self.max_tokens)
    }

    async fn try_run(&self, stack: &PromptStack) -> Result<Message> {
        let messages = chat_messages(stack)?;
        let params = GenerationParams {
            max_new_tokens: self.max_tokens,
            temperature: self.temperature,
            do_sample: true,
            extra: self.params.clone(),
        };

        let mut choices = self.pipeline.generate(&messages, &params).await?;
        match choices.len() {
            0 => bail!("pipeline returned no completions"),
            1 => {}
            _ => bail!("completion with more than one choice is not supported yet"),
        }
        let generated = choices
            .pop()
            .and_then(|mut conversation| conversation.pop())
            .ok_or_else(|| anyhow!("invalid output format"))?
            .content;

        let input_tokens = self.prompt_stack_to_tokens(stack)?.len() as u32;
        let output_tokens = self.pipeline.encode(&generated)?.len() as u32;

        Ok(Message::assistant(generated).with_usage(Usage::new(input_tokens, output_tokens)))
    }

    fn try_stream(&self, _stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send {
        futures_util::stream::once(async { Err(anyhow!("streaming is not supported")) })
    }
}

/// Each message must hold exactly one text content.
fn chat_messages(stack: &PromptStack) -> Result<Vec<ChatMessage>> {
    stack
        .messages
        .iter()
        .map(|message| {
            let [content] = message.content.as_slice() else {
                bail!("Invalid input content length.");
            };
            let Content::Text { text } = content else {
                bail!("Unsupported content type");
            };
            Ok(ChatMessage {
                role: message.role.as_str().to_owned(),
                content: text.clone(),
            })
        })
        .collect()
}

