//! Shared HTTP transport for the hosted prompt drivers.
//!
//! `HttpClient` wraps a `reqwest::Client` with pre-configured headers and
//! endpoint URL. Provides `send()` for non-streaming and `stream_sse()` for
//! Server-Sent Events streaming.

use anyhow::{Result, bail};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

/// Shared HTTP transport for hosted drivers.
///
/// Holds a `reqwest::Client`, pre-built headers (auth + content-type),
/// and the target endpoint URL.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
}

impl HttpClient {
    /// Create a client with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut headers = json_headers();
        headers.insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Create a client without authentication (e.g. a local gateway).
    pub fn no_auth(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            headers: json_headers(),
            endpoint: endpoint.to_owned(),
        }
    }

    /// Create a client with a custom header for authentication.
    ///
    /// Azure OpenAI authenticates with `api-key` instead of a Bearer token.
    pub fn custom_header(
        client: Client,
        header_name: &str,
        header_value: &str,
        endpoint: &str,
    ) -> Result<Self> {
        let mut headers = json_headers();
        headers.insert(
            header_name.parse::<HeaderName>()?,
            header_value.parse::<HeaderValue>()?,
        );
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Send a non-streaming request and deserialize the response as JSON.
    pub async fn send<T: DeserializeOwned>(&self, body: &impl Serialize) -> Result<T> {
        tracing::debug!("request: {}", serde_json::to_string(body)?);
        let response = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            bail!("request to {} failed with {status}: {text}", self.endpoint);
        }

        tracing::trace!("response: {text}");
        serde_json::from_str(&text).map_err(Into::into)
    }

    /// Stream an SSE response, yielding each `data:` payload.
    ///
    /// Payloads are reassembled across network chunks and the `[DONE]`
    /// sentinel ends the stream.
    pub fn stream_sse(&self, body: &impl Serialize) -> impl Stream<Item = Result<String>> + Send {
        if let Ok(body) = serde_json::to_string(body) {
            tracing::debug!("request: {}", body);
        }
        let request = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(body);
        let endpoint = self.endpoint.clone();

        try_stream! {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err::<(), _>(anyhow::anyhow!("request to {endpoint} failed with {status}: {text}"))?;
            } else {
                let mut decoder = SseDecoder::default();
                let mut stream = response.bytes_stream();
                'outer: while let Some(next) = stream.next().await {
                    let bytes = next?;
                    tracing::trace!("chunk: {}", String::from_utf8_lossy(&bytes));
                    for data in decoder.push(&bytes) {
                        if data == "[DONE]" {
                            break 'outer;
                        }
                        yield data;
                    }
                }
            }
        }
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Line buffer turning raw SSE bytes into `data:` payloads.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes, returning every payload completed by them.
    ///
    /// Bytes are buffered until a full line arrives, so characters split
    /// across chunks decode intact.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    out.push(data.to_owned());
                }
            }
        }
        out
    }
}
