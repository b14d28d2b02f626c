//! The prompt driver trait and its type-erased handle.

use anyhow::Result;
use futures_core::Stream;
use futures_util::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tcore::{DeltaMessage, Message, PromptStack, Tokenizer};

/// A vendor adapter turning a prompt stack into a model reply.
///
/// Drivers are stateless with respect to a run: they hold credentials and
/// sampling parameters, never conversation state.
pub trait PromptDriver: Send + Sync + 'static {
    /// The model identifier.
    fn model(&self) -> &str;

    /// Whether callers should prefer [`PromptDriver::try_stream`].
    fn stream(&self) -> bool {
        false
    }

    /// Token budget of the model.
    fn tokenizer(&self) -> Tokenizer {
        Tokenizer::for_model(self.model())
    }

    /// Send the stack and wait for the complete reply.
    fn try_run(&self, stack: &PromptStack) -> impl Future<Output = Result<Message>> + Send;

    /// Send the stack and stream the reply as deltas.
    fn try_stream(&self, stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send;
}

/// Object-safe mirror of [`PromptDriver`].
trait ErasedDriver: Send + Sync {
    fn model(&self) -> &str;

    fn stream(&self) -> bool;

    fn tokenizer(&self) -> Tokenizer;

    fn try_run<'a>(&'a self, stack: &'a PromptStack) -> BoxFuture<'a, Result<Message>>;

    fn try_stream<'a>(&'a self, stack: PromptStack) -> BoxStream<'a, Result<DeltaMessage>>;
}

impl<D: PromptDriver> ErasedDriver for D {
    fn model(&self) -> &str {
        PromptDriver::model(self)
    }

    fn stream(&self) -> bool {
        PromptDriver::stream(self)
    }

    fn tokenizer(&self) -> Tokenizer {
        PromptDriver::tokenizer(self)
    }

    fn try_run<'a>(&'a self, stack: &'a PromptStack) -> BoxFuture<'a, Result<Message>> {
        Box::pin(PromptDriver::try_run(self, stack))
    }

    fn try_stream<'a>(&'a self, stack: PromptStack) -> BoxStream<'a, Result<DeltaMessage>> {
        Box::pin(PromptDriver::try_stream(self, stack))
    }
}

/// A cloneable, type-erased prompt driver with its retry policy.
#[derive(Clone)]
pub struct Driver {
    inner: Arc<dyn ErasedDriver>,
    retry: Retry,
}

impl Driver {
    /// Erase a concrete driver.
    pub fn new(driver: impl PromptDriver) -> Self {
        Self {
            inner: Arc::new(driver),
            retry: Retry::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy.
    pub fn retry(&self) -> &Retry {
        &self.retry
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Whether the driver streams.
    pub fn stream(&self) -> bool {
        self.inner.stream()
    }

    /// Token budget of the model.
    pub fn tokenizer(&self) -> Tokenizer {
        self.inner.tokenizer()
    }

    /// One attempt at a complete reply.
    pub async fn try_run(&self, stack: &PromptStack) -> Result<Message> {
        self.inner.try_run(stack).await
    }

    /// One attempt at a streamed reply.
    pub fn try_stream(&self, stack: PromptStack) -> BoxStream<'_, Result<DeltaMessage>> {
        self.inner.try_stream(stack)
    }

    /// A complete reply, retried per the policy.
    pub async fn run(&self, stack: &PromptStack) -> Result<Message> {
        let mut attempt = 1;
        loop {
            match self.try_run(stack).await {
                Ok(message) => return Ok(message),
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "prompt attempt {attempt} on {} failed: {e}, retrying in {delay:?}",
                        self.model()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("model", &self.model())
            .field("stream", &self.stream())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Exponential backoff between failed prompt attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound of any delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per retry.
    pub multiplier: f64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_delay_ms: 2_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl Retry {
    /// A policy with explicit bounds.
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay_ms: min_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let millis = (self.min_delay_ms as f64) * self.multiplier.powi(exp);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }
}
