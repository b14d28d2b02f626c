//! Prompt drivers for the Trellis LLM framework.
//!
//! A [`PromptDriver`] translates a vendor-neutral [`tcore::PromptStack`]
//! into one vendor API call and back. Structures hold drivers as the
//! type-erased, cloneable [`Driver`], which also carries the [`Retry`]
//! policy.

pub use bedrock::{BedrockDriver, ConverseClient, EventStream};
pub use config::{AzureOpenAiConfig, DriverConfig, OpenAiConfig, build_driver};
pub use driver::{Driver, PromptDriver, Retry};
pub use dummy::DummyDriver;
pub use http::{HttpClient, SseDecoder};
pub use huggingface::{
    ChatMessage, GenerationParams, HuggingFacePipelineDriver, TextGenerationPipeline,
};
pub use openai::OpenAiDriver;
pub use reqwest::Client;

pub mod bedrock;
mod config;
mod driver;
mod dummy;
mod http;
pub mod huggingface;
pub mod openai;
#[cfg(feature = "testing")]
pub mod testing;
