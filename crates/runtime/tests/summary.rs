//! Tests for the summary engine and summary task.

use model::{
    Driver, Retry,
    testing::{Script, ScriptedDriver},
};
use tcore::Tokenizer;
use trellis_runtime::{Artifact, Error, EventBus, Structure, SummaryEngine, TextSummaryTask};

fn scripted(tokenizer: Tokenizer, replies: usize) -> (ScriptedDriver, Driver) {
    let scripted = ScriptedDriver::new("gpt-4o").with_tokenizer(tokenizer);
    for i in 1..=replies {
        scripted.push(Script::text(format!("s{i}")));
    }
    let driver = Driver::new(scripted.clone()).with_retry(Retry::none());
    (scripted, driver)
}

#[test]
fn budgets_follow_the_multiplier() {
    let (_, driver) = scripted(Tokenizer::new(1_000, 100), 0);
    let engine = SummaryEngine::new(driver.clone());
    assert_eq!(engine.max_chunker_tokens(), 500);
    assert_eq!(engine.min_response_tokens(), 500);

    let engine = SummaryEngine::new(driver).with_max_token_multiplier(0.25).unwrap();
    assert_eq!(engine.max_chunker_tokens(), 250);
    assert_eq!(engine.min_response_tokens(), 750);
}

#[test]
fn multiplier_must_be_in_range() {
    let (_, driver) = scripted(Tokenizer::new(1_000, 100), 0);
    let engine = SummaryEngine::new(driver);
    assert!(matches!(
        engine.clone().with_max_token_multiplier(0.0),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        engine.clone().with_max_token_multiplier(1.5),
        Err(Error::InvalidConfig(_))
    ));
    assert!(engine.with_max_token_multiplier(1.0).is_ok());
}

#[tokio::test]
async fn short_text_is_summarized_at_once() {
    let (seen, driver) = scripted(Tokenizer::new(8_192, 1_024), 1);
    let engine = SummaryEngine::new(driver);
    let output = engine
        .summarize_text("The sky is blue.", &[], &EventBus::new())
        .await
        .unwrap();
    assert_eq!(output, Artifact::text("s1"));

    let stacks = seen.seen();
    assert_eq!(stacks.len(), 1);
    assert!(stacks[0].messages[0].text().contains("The sky is blue."));
}

#[tokio::test]
async fn long_text_is_folded_chunk_by_chunk() {
    let (seen, driver) = scripted(Tokenizer::new(100, 50), 10);
    let engine = SummaryEngine::new(driver);
    let text = "word ".repeat(60);
    let output = engine
        .summarize_text(&text, &[], &EventBus::new())
        .await
        .unwrap();

    let stacks = seen.seen();
    assert!(stacks.len() >= 2);
    assert_eq!(output, Artifact::text(format!("s{}", stacks.len())));
    assert!(stacks[1].messages[0].text().contains("s1"));
}

#[tokio::test]
async fn summary_task_summarizes_its_input() {
    let (seen, driver) = scripted(Tokenizer::new(8_192, 1_024), 1);
    let mut pipeline = Structure::pipeline(driver);
    pipeline
        .add_task(TextSummaryTask::new("Notes: {{ args[0] }}"))
        .unwrap();

    let output = pipeline.run(["meeting went well"]).await.unwrap();
    assert_eq!(output, Some(Artifact::text("s1")));
    assert!(seen.seen()[0].messages[0].text().contains("Notes: meeting went well"));
}
