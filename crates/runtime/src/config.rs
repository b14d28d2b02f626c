//! Structure configuration loaded from TOML.

use crate::{ConversationMemory, Error, Result, Ruleset};
use model::{Driver, DriverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default capacity of the stream bridge channel.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Everything a structure needs besides its tasks.
///
/// ```toml
/// [prompt_driver]
/// driver = "openai"
/// model = "gpt-4o"
/// api_key = "${OPENAI_API_KEY}"
/// stream = true
///
/// [conversation_memory]
/// max_runs = 10
///
/// [[rulesets]]
/// name = "tone"
/// rules = ["be polite"]
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// The prompt driver.
    pub prompt_driver: DriverConfig,
    /// Conversation memory settings.
    pub conversation_memory: MemoryConfig,
    /// Stream bridge settings.
    pub stream: StreamConfig,
    /// Structure-wide rulesets.
    pub rulesets: Vec<Ruleset>,
}

/// Conversation memory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Whether runs are remembered.
    pub enabled: bool,
    /// Keep at most this many runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<usize>,
    /// Prune old runs that overflow the prompt.
    pub autoprune: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_runs: None,
            autoprune: true,
        }
    }
}

impl MemoryConfig {
    /// The memory these settings describe, `None` when disabled.
    pub fn build(&self) -> Option<ConversationMemory> {
        if !self.enabled {
            return None;
        }
        let mut memory = ConversationMemory::new().with_autoprune(self.autoprune);
        memory.max_runs = self.max_runs;
        Some(memory)
    }
}

/// Stream bridge settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Events buffered before the producer waits.
    pub capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

impl StructureConfig {
    /// Parse a TOML string, expanding environment variables first.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let expanded = tcore::expand_env_vars(toml_str);
        Ok(toml::from_str(&expanded)?)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("loaded structure config from {}", path.display());
        Self::from_toml(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Overlay `overrides` onto this config, merging tables key by key.
    pub fn merge(&self, overrides: toml::Table) -> Result<Self> {
        let mut base = match toml::Value::try_from(self) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(Error::InvalidConfig("config is not a table".into())),
            Err(e) => return Err(Error::InvalidConfig(e.to_string())),
        };
        merge_tables(&mut base, overrides);
        Ok(toml::Value::Table(base).try_into()?)
    }

    /// Build the configured prompt driver.
    pub fn driver(&self, client: reqwest::Client) -> anyhow::Result<Driver> {
        model::build_driver(&self.prompt_driver, client)
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(table) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, table),
                _ => {
                    base.insert(key, toml::Value::Table(table));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
