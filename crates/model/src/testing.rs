//! A scripted prompt driver for tests.

use crate::PromptDriver;
use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures_core::Stream;
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};
use tcore::{Content, DeltaMessage, Message, MessageBuilder, PromptStack, Role, Tokenizer};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Script {
    /// A complete message; streamed as one text delta per text content.
    Message(Message),
    /// A sequence of deltas; folded into a message when not streaming.
    Deltas(Vec<DeltaMessage>),
    /// A failed attempt.
    Error(String),
    /// Some deltas, then a failure.
    FailAfter(Vec<DeltaMessage>, String),
}

impl Script {
    /// An assistant text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message(Message::assistant(text))
    }

    /// A streamed reply of text fragments at index 0.
    pub fn chunks<'a>(chunks: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Deltas(chunks.into_iter().map(|c| DeltaMessage::text(0, c)).collect())
    }

    /// A failed attempt.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

struct Inner {
    script: Mutex<VecDeque<Script>>,
    seen: Mutex<Vec<PromptStack>>,
}

/// Replays scripted replies in order and records every stack it receives.
///
/// Clones share the script and the record, so a test can keep a handle
/// after erasing the driver.
#[derive(Clone)]
pub struct ScriptedDriver {
    model: String,
    stream: bool,
    tokenizer: Tokenizer,
    inner: Arc<Inner>,
}

impl ScriptedDriver {
    /// Create an empty script.
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_owned(),
            stream: false,
            tokenizer: Tokenizer::for_model(model),
            inner: Arc::new(Inner {
                script: Mutex::new(VecDeque::new()),
                seen: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Toggle streaming.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Override the tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Append a reply to the script.
    pub fn then(self, script: Script) -> Self {
        self.push(script);
        self
    }

    /// Append a reply to a shared script.
    pub fn push(&self, script: Script) {
        self.inner.script.lock().push_back(script);
    }

    /// Every stack received so far.
    pub fn seen(&self) -> Vec<PromptStack> {
        self.inner.seen.lock().clone()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.script.lock().len()
    }

    fn next(&self, stack: &PromptStack) -> Result<Script> {
        self.inner.seen.lock().push(stack.clone());
        self.inner
            .script
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted driver has no reply left"))
    }
}

impl PromptDriver for ScriptedDriver {
    fn model(&self) -> &str {
        &self.model
    }

    fn stream(&self) -> bool {
        self.stream
    }

    fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    async fn try_run(&self, stack: &PromptStack) -> Result<Message> {
        match self.next(stack)? {
            Script::Message(message) => Ok(message),
            Script::Deltas(deltas) => {
                let mut builder = MessageBuilder::new(Role::Assistant);
                for delta in &deltas {
                    builder.accept(delta);
                }
                Ok(builder.build())
            }
            Script::Error(e) | Script::FailAfter(_, e) => Err(anyhow!(e)),
        }
    }

    fn try_stream(&self, stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send {
        try_stream! {
            match self.next(&stack)? {
                Script::Message(message) => {
                    for (index, content) in message.content.iter().enumerate() {
                        if let Content::Text { text } = content {
                            yield DeltaMessage::text(index as u32, text.clone());
                        }
                    }
                    yield DeltaMessage::usage(message.usage);
                }
                Script::Deltas(deltas) => {
                    for delta in deltas {
                        yield delta;
                    }
                }
                Script::Error(e) => Err::<(), _>(anyhow!(e))?,
                Script::FailAfter(deltas, e) => {
                    for delta in deltas {
                        yield delta;
                    }
                    Err::<(), _>(anyhow!(e))?;
                }
            }
        }
    }
}
