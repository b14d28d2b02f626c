//! Amazon Bedrock Converse driver.
//!
//! The AWS SDK stays outside this crate: callers hand in a
//! [`ConverseClient`] that forwards the JSON parameters to
//! `Converse`/`ConverseStream` and returns the raw JSON results.

use crate::PromptDriver;
use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::{StreamExt, stream::BoxStream};
use serde_json::{Map, Value};
use std::future::Future;
use tcore::{DeltaMessage, Message, PromptStack};

pub use params::converse_params;

mod event;
mod params;

/// Stream of raw `ConverseStream` events.
pub type EventStream = BoxStream<'static, Result<Value>>;

/// The Bedrock runtime boundary.
pub trait ConverseClient: Send + Sync + 'static {
    /// Call `Converse`, returning the response document.
    fn converse(&self, params: Value) -> impl Future<Output = Result<Value>> + Send;

    /// Call `ConverseStream`, returning its event stream if the response
    /// carried one.
    fn converse_stream(
        &self,
        params: Value,
    ) -> impl Future<Output = Result<Option<EventStream>>> + Send;
}

/// Driver for Bedrock models through the Converse API.
pub struct BedrockDriver<C> {
    client: C,
    model: String,
    temperature: f32,
    additional_model_request_fields: Map<String, Value>,
    stream: bool,
}

impl<C: ConverseClient> BedrockDriver<C> {
    /// Create a driver for a Bedrock model id.
    pub fn new(client: C, model: &str) -> Self {
        Self {
            client,
            model: model.to_owned(),
            temperature: 0.1,
            additional_model_request_fields: Map::new(),
            stream: false,
        }
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model specific request fields, passed through untouched.
    pub fn additional_model_request_fields(mut self, fields: Map<String, Value>) -> Self {
        self.additional_model_request_fields = fields;
        self
    }

    /// Prefer streaming replies.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The Converse parameters for a stack.
    pub fn params(&self, stack: &PromptStack) -> Value {
        converse_params(
            &self.model,
            self.temperature,
            &self.additional_model_request_fields,
            stack,
        )
    }
}

impl<C: ConverseClient> PromptDriver for BedrockDriver<C> {
    fn model(&self) -> &str {
        &self.model
    }

    fn stream(&self) -> bool {
        self.stream
    }

    async fn try_run(&self, stack: &PromptStack) -> Result<Message> {
        let params = self.params(stack);
        tracing::debug!("converse: {params}");
        let response = self.client.converse(params).await?;
        event::response_message(response, &stack.tools)
    }

    fn try_stream(&self, stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send {
        let params = self.params(&stack);
        try_stream! {
            tracing::debug!("converse stream: {params}");
            let mut events = self
                .client
                .converse_stream(params)
                .await?
                .ok_or_else(|| anyhow!("model response is empty"))?;

            while let Some(event) = events.next().await {
                let event = event?;
                tracing::trace!("event: {event}");
                if let Some(delta) = event::stream_delta(event, &stack.tools)? {
                    yield delta;
                }
            }
        }
    }
}
