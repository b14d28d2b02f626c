//! OpenAI chat completions driver, also serving Azure OpenAI deployments.

use crate::{PromptDriver, http::HttpClient};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
pub use request::Request;
pub use response::{Response, StreamChunk};
use reqwest::Client;
use tcore::{DeltaMessage, Message, PromptStack, Tokenizer};

mod request;
mod response;

/// The OpenAI chat completions endpoint.
pub const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default Azure OpenAI API version.
pub const AZURE_API_VERSION: &str = "2023-05-15";

/// Driver for OpenAI-compatible chat completions APIs.
#[derive(Clone)]
pub struct OpenAiDriver {
    http: HttpClient,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    stream: bool,
}

impl OpenAiDriver {
    /// Create a driver for the OpenAI API.
    pub fn api(client: Client, key: &str, model: &str) -> Result<Self> {
        Self::custom(client, key, ENDPOINT, model)
    }

    /// Create a driver for an OpenAI-compatible endpoint.
    ///
    /// A base URL without the `/chat/completions` suffix gets it appended.
    /// An empty key sends no authorization header.
    pub fn custom(client: Client, key: &str, base_url: &str, model: &str) -> Result<Self> {
        let endpoint = chat_endpoint(base_url);
        let http = if key.is_empty() {
            HttpClient::no_auth(client, &endpoint)
        } else {
            HttpClient::bearer(client, key, &endpoint)?
        };
        Ok(Self::with_http(http, model))
    }

    /// Create a driver for an Azure OpenAI deployment.
    pub fn azure(
        client: Client,
        key: &str,
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        model: &str,
    ) -> Result<Self> {
        let endpoint = format!(
            "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
            endpoint.trim_end_matches('/')
        );
        let http = HttpClient::custom_header(client, "api-key", key, &endpoint)?;
        Ok(Self::with_http(http, model))
    }

    fn with_http(http: HttpClient, model: &str) -> Self {
        Self {
            http,
            model: model.to_owned(),
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the completion length.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Prefer streaming replies.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        self.http.endpoint()
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &reqwest::header::HeaderMap {
        self.http.headers()
    }

    /// The request body for a stack.
    pub fn request(&self, stack: &PromptStack) -> Request {
        let mut request = Request::new(&self.model, stack);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }
}

impl PromptDriver for OpenAiDriver {
    fn model(&self) -> &str {
        &self.model
    }

    fn stream(&self) -> bool {
        self.stream
    }

    fn tokenizer(&self) -> Tokenizer {
        let mut tokenizer = Tokenizer::for_model(&self.model);
        if let Some(max_tokens) = self.max_tokens {
            tokenizer.max_output_tokens = max_tokens;
        }
        tokenizer
    }

    async fn try_run(&self, stack: &PromptStack) -> Result<Message> {
        let body = self.request(stack);
        let response: Response = self.http.send(&body).await?;
        response.into_message(&stack.tools)
    }

    fn try_stream(&self, stack: PromptStack) -> impl Stream<Item = Result<DeltaMessage>> + Send {
        let body = self.request(&stack).stream();
        try_stream! {
            let mut stream = std::pin::pin!(self.http.stream_sse(&body));
            while let Some(data) = stream.next().await {
                let data = data?;
                match serde_json::from_str::<StreamChunk>(&data) {
                    Ok(chunk) => {
                        for delta in chunk.into_deltas(&stack.tools) {
                            yield delta;
                        }
                    }
                    Err(e) => tracing::warn!("failed to parse chunk: {e}, data: {data}"),
                }
            }
        }
    }
}

fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_owned()
    } else {
        format!("{base}/chat/completions")
    }
}
