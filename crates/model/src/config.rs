//! Prompt driver configuration loaded from TOML.

use crate::{Driver, DummyDriver, OpenAiDriver, Retry, openai::AZURE_API_VERSION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which prompt driver to build, and how.
///
/// ```toml
/// driver = "openai"
/// model = "gpt-4o"
/// api_key = "${OPENAI_API_KEY}"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DriverConfig {
    /// OpenAI, or any OpenAI-compatible endpoint via `base_url`.
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    /// An Azure OpenAI deployment.
    #[serde(rename = "azure_openai")]
    AzureOpenAi(AzureOpenAiConfig),
    /// The placeholder driver that refuses every prompt.
    #[default]
    Dummy,
}

/// OpenAI driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Model identifier.
    pub model: String,
    /// API key (supports `${ENV_VAR}` expansion).
    #[serde(default)]
    pub api_key: String,
    /// Optional base URL override for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Prefer streaming replies.
    #[serde(default)]
    pub stream: bool,
    /// Retry policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Retry>,
}

/// Azure OpenAI driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    /// Model identifier.
    pub model: String,
    /// Deployment name, defaults to the model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// API key (supports `${ENV_VAR}` expansion).
    #[serde(default)]
    pub api_key: String,
    /// API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Prefer streaming replies.
    #[serde(default)]
    pub stream: bool,
    /// Retry policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Retry>,
}

fn default_api_version() -> String {
    AZURE_API_VERSION.to_owned()
}

impl DriverConfig {
    /// Parse a TOML string, expanding environment variables first.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let expanded = tcore::expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(c) => &c.model,
            Self::AzureOpenAi(c) => &c.model,
            Self::Dummy => "dummy-model",
        }
    }

    /// Whether the configured driver streams.
    pub fn stream(&self) -> bool {
        match self {
            Self::OpenAi(c) => c.stream,
            Self::AzureOpenAi(c) => c.stream,
            Self::Dummy => false,
        }
    }
}

/// Construct a [`Driver`] from config and a shared HTTP client.
pub fn build_driver(config: &DriverConfig, client: reqwest::Client) -> Result<Driver> {
    let (driver, retry) = match config {
        DriverConfig::OpenAi(c) => {
            let mut driver = match c.base_url.as_deref() {
                Some(url) => OpenAiDriver::custom(client, &c.api_key, url, &c.model)?,
                None => OpenAiDriver::api(client, &c.api_key, &c.model)?,
            };
            if let Some(temperature) = c.temperature {
                driver = driver.temperature(temperature);
            }
            if let Some(max_tokens) = c.max_tokens {
                driver = driver.max_tokens(max_tokens);
            }
            (Driver::new(driver.streaming(c.stream)), c.retry)
        }
        DriverConfig::AzureOpenAi(c) => {
            let deployment = c.deployment.as_deref().unwrap_or(&c.model);
            let mut driver = OpenAiDriver::azure(
                client,
                &c.api_key,
                &c.endpoint,
                deployment,
                &c.api_version,
                &c.model,
            )?;
            if let Some(temperature) = c.temperature {
                driver = driver.temperature(temperature);
            }
            if let Some(max_tokens) = c.max_tokens {
                driver = driver.max_tokens(max_tokens);
            }
            (Driver::new(driver.streaming(c.stream)), c.retry)
        }
        DriverConfig::Dummy => (Driver::new(DummyDriver), Some(Retry::none())),
    };

    tracing::debug!("built prompt driver for {}", driver.model());
    Ok(match retry {
        Some(retry) => driver.with_retry(retry),
        None => driver,
    })
}
