//! Tests for `DriverConfig` and `build_driver()`.

use trellis_model::{DriverConfig, Retry, build_driver};

#[test]
fn parse_openai_config() {
    let toml = r#"
driver = "openai"
model = "gpt-4o"
api_key = "sk-test"
temperature = 0.2
stream = true
"#;
    let DriverConfig::OpenAi(config) = DriverConfig::from_toml(toml).unwrap() else {
        panic!("expected an openai config");
    };
    assert_eq!(config.model, "gpt-4o");
    assert_eq!(config.api_key, "sk-test");
    assert_eq!(config.temperature, Some(0.2));
    assert!(config.stream);
    assert!(config.base_url.is_none());
}

#[test]
fn parse_azure_defaults() {
    let toml = r#"
driver = "azure_openai"
model = "gpt-4o"
endpoint = "https://example.openai.azure.com"
api_key = "k"
"#;
    let DriverConfig::AzureOpenAi(config) = DriverConfig::from_toml(toml).unwrap() else {
        panic!("expected an azure config");
    };
    assert_eq!(config.api_version, "2023-05-15");
    assert!(config.deployment.is_none());
    assert!(!config.stream);
}

#[test]
fn parse_dummy() {
    let config = DriverConfig::from_toml("driver = \"dummy\"").unwrap();
    assert_eq!(config, DriverConfig::Dummy);
    assert!(!config.stream());
}

#[test]
fn parse_retry_override() {
    let toml = r#"
driver = "openai"
model = "gpt-4o"

[retry]
max_attempts = 3
"#;
    let DriverConfig::OpenAi(config) = DriverConfig::from_toml(toml).unwrap() else {
        panic!("expected an openai config");
    };
    let retry = config.retry.unwrap();
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.min_delay_ms, Retry::default().min_delay_ms);
}

#[test]
fn unknown_driver_rejected() {
    assert!(DriverConfig::from_toml("driver = \"nope\"").is_err());
}

#[test]
fn env_vars_expanded() {
    let toml = r#"
driver = "openai"
model = "gpt-4o"
api_key = "${TRELLIS_SURELY_UNSET_KEY}"
"#;
    let DriverConfig::OpenAi(config) = DriverConfig::from_toml(toml).unwrap() else {
        panic!("expected an openai config");
    };
    assert_eq!(config.api_key, "");
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("driver.toml");
    std::fs::write(&path, "driver = \"dummy\"\n").unwrap();
    assert_eq!(DriverConfig::load(&path).unwrap(), DriverConfig::Dummy);
    assert!(DriverConfig::load(&dir.path().join("missing.toml")).is_err());
}

#[test]
fn build_openai_driver() {
    let config = DriverConfig::from_toml(
        "driver = \"openai\"\nmodel = \"gpt-4o\"\napi_key = \"k\"\nstream = true\n",
    )
    .unwrap();
    let driver = build_driver(&config, trellis_model::Client::new()).unwrap();
    assert_eq!(driver.model(), "gpt-4o");
    assert!(driver.stream());
    assert_eq!(driver.retry(), &Retry::default());
}

#[test]
fn build_azure_driver_with_retry() {
    let config = DriverConfig::from_toml(
        r#"
driver = "azure_openai"
model = "gpt-4o"
endpoint = "https://example.openai.azure.com"
api_key = "k"

[retry]
max_attempts = 1
"#,
    )
    .unwrap();
    let driver = build_driver(&config, trellis_model::Client::new()).unwrap();
    assert_eq!(driver.retry().max_attempts, 1);
}

#[tokio::test]
async fn dummy_driver_refuses() {
    let driver = build_driver(&DriverConfig::Dummy, trellis_model::Client::new()).unwrap();
    assert!(!driver.stream());
    assert_eq!(driver.retry().max_attempts, 1);
    let err = driver
        .try_run(&tcore::PromptStack::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dummy prompt driver"));
}
