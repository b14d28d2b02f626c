//! Shared helpers for runtime examples.

#![allow(dead_code)]

use trellis_runtime::StructureConfig;

/// Config used when `TRELLIS_CONFIG` is not set.
const DEFAULT_CONFIG: &str = r#"
[prompt_driver]
driver = "openai"
model = "gpt-4o-mini"
api_key = "${OPENAI_API_KEY}"
stream = true
"#;

/// Initialize tracing with env-filter support.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Load the structure config from `TRELLIS_CONFIG`, falling back to
/// OpenAI with `OPENAI_API_KEY`.
pub fn load_config() -> StructureConfig {
    match std::env::var("TRELLIS_CONFIG") {
        Ok(path) => StructureConfig::load(path.as_ref()).expect("failed to load TRELLIS_CONFIG"),
        Err(_) => StructureConfig::from_toml(DEFAULT_CONFIG).expect("invalid default config"),
    }
}
