//! Placeholder driver for structures configured without a model.
//!
//! Every call fails with an error naming the missing configuration, so a
//! structure built from a default config runs to completion with error
//! artifacts instead of reaching the network.

use crate::PromptDriver;
use anyhow::{Result, anyhow};
use futures_core::Stream;
use tcore::{DeltaMessage, Message, PromptStack};

/// A driver that refuses every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyDriver;

const DUMMY_ERROR: &str =
    "the dummy prompt driver cannot run prompts, configure a prompt driver for this structure";

impl PromptDriver for DummyDriver {
    fn model(&self) -> &str {
        "dummy-model"
    }

    async fn try_run(&self, _stack: &PromptStack) -> Result<Message> {
        Err(anyhow!(DUMMY_ERROR))
    }

    fn try_stream(&self, _stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send {
        futures_util::stream::once(async { Err(anyhow!(DUMMY_ERROR)) })
    }
}
