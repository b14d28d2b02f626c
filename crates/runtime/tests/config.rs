//! Tests for structure configuration.

use model::DriverConfig;
use trellis_runtime::{
    DEFAULT_STREAM_CAPACITY, Error, Structure, StructureConfig, StructureKind,
};

const CONFIG: &str = r#"
[prompt_driver]
driver = "openai"
model = "gpt-4o"
api_key = "${TRELLIS_TEST_UNSET_KEY}"
stream = true

[conversation_memory]
max_runs = 3
autoprune = false

[stream]
capacity = 8

[[rulesets]]
name = "tone"
rules = ["be polite", "be brief"]
"#;

#[test]
fn parses_every_section() {
    let config = StructureConfig::from_toml(CONFIG).unwrap();
    assert_eq!(config.prompt_driver.model(), "gpt-4o");
    assert!(config.prompt_driver.stream());
    assert_eq!(config.conversation_memory.max_runs, Some(3));
    assert!(!config.conversation_memory.autoprune);
    assert_eq!(config.stream.capacity, 8);
    assert_eq!(config.rulesets[0].name, "tone");
    assert_eq!(config.rulesets[0].rules.len(), 2);

    let DriverConfig::OpenAi(openai) = &config.prompt_driver else {
        panic!("expected an openai driver");
    };
    assert_eq!(openai.api_key, "");
}

#[test]
fn empty_config_uses_defaults() {
    let config = StructureConfig::from_toml("").unwrap();
    assert_eq!(config, StructureConfig::default());
    assert_eq!(config.prompt_driver, DriverConfig::Dummy);
    assert!(config.conversation_memory.enabled);
    assert_eq!(config.stream.capacity, DEFAULT_STREAM_CAPACITY);
}

#[test]
fn invalid_toml_is_an_error() {
    assert!(matches!(
        StructureConfig::from_toml("[stream]\ncapacity = \"many\""),
        Err(Error::Toml(_))
    ));
}

#[test]
fn merge_overrides_nested_keys() {
    let config = StructureConfig::from_toml(CONFIG).unwrap();
    let overrides: toml::Table = toml::from_str(
        r#"
[prompt_driver]
model = "gpt-4o-mini"

[conversation_memory]
max_runs = 10
"#,
    )
    .unwrap();

    let merged = config.merge(overrides).unwrap();
    assert_eq!(merged.prompt_driver.model(), "gpt-4o-mini");
    assert!(merged.prompt_driver.stream());
    assert_eq!(merged.conversation_memory.max_runs, Some(10));
    assert!(!merged.conversation_memory.autoprune);
    assert_eq!(merged.rulesets, config.rulesets);
}

#[test]
fn round_trips_through_toml() {
    let config = StructureConfig::from_toml(CONFIG).unwrap();
    let text = config.to_toml().unwrap();
    assert_eq!(StructureConfig::from_toml(&text).unwrap(), config);
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trellis.toml");
    std::fs::write(&path, CONFIG).unwrap();
    assert_eq!(
        StructureConfig::load(&path).unwrap(),
        StructureConfig::from_toml(CONFIG).unwrap()
    );
    assert!(matches!(
        StructureConfig::load(&dir.path().join("missing.toml")),
        Err(Error::Io(_))
    ));
}

#[test]
fn builds_a_structure() {
    let config = StructureConfig::from_toml(
        r#"
[conversation_memory]
enabled = false

[[rulesets]]
name = "tone"
rules = ["be polite"]
"#,
    )
    .unwrap();
    let client = model::Client::new();
    let workflow = Structure::from_config(StructureKind::Workflow, &config, client).unwrap();
    assert_eq!(workflow.kind(), StructureKind::Workflow);
    assert_eq!(workflow.driver().model(), "dummy-model");
    assert!(workflow.memory().is_none());
    assert_eq!(workflow.rulesets().len(), 1);

    let agent =
        Structure::from_config(StructureKind::Agent, &StructureConfig::default(), model::Client::new())
            .unwrap();
    assert_eq!(agent.tasks().count(), 1);
    assert!(agent.memory().is_some());
}
