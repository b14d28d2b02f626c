//! Tests for the streaming bridge.

use futures_util::StreamExt;
use model::{
    Driver, Retry,
    testing::{Script, ScriptedDriver},
};
use tcore::{DeltaContent, DeltaMessage};
use trellis_runtime::{Error, Stream, Structure};

fn streaming(replies: impl IntoIterator<Item = Script>) -> Structure {
    let scripted = ScriptedDriver::new("gpt-4o").streaming(true);
    for reply in replies {
        scripted.push(reply);
    }
    Structure::agent(Driver::new(scripted).with_retry(Retry::none()))
}

#[tokio::test]
async fn yields_tokens_then_prompt_break() {
    let mut stream = Stream::new(streaming([Script::chunks(["Hel", "lo"])])).unwrap();
    let chunks: Vec<String> = stream
        .run(["hi"])
        .map(|chunk| chunk.unwrap().value)
        .collect()
        .await;
    assert_eq!(chunks, ["Hel", "lo", "\n"]);

    let agent = stream.structure().expect("structure restored");
    let runs = agent.memory().unwrap().runs();
    assert_eq!(runs[0].output, "Hello");
}

#[tokio::test]
async fn runs_again_after_restoring() {
    let mut stream = Stream::new(streaming([
        Script::chunks(["one"]),
        Script::chunks(["two"]),
    ]))
    .unwrap();
    let first: Vec<_> = stream.run(["a"]).collect().await;
    let second: Vec<String> = stream
        .run(["b"])
        .map(|chunk| chunk.unwrap().value)
        .collect()
        .await;
    assert_eq!(first.len(), 2);
    assert_eq!(second, ["two", "\n"]);
    assert_eq!(stream.into_inner().unwrap().memory().unwrap().runs().len(), 2);
}

#[tokio::test]
async fn announces_tool_calls() {
    let action = |name: Option<&str>, input: Option<&str>| DeltaMessage {
        content: Some(DeltaContent::Action {
            index: 1,
            tag: name.map(|_| "call_1".into()),
            name: name.map(Into::into),
            path: name.map(|_| "add".into()),
            partial_input: input.map(Into::into),
        }),
        ..Default::default()
    };
    let reply = Script::Deltas(vec![
        DeltaMessage::text(0, "Let me add."),
        action(Some("calc"), None),
        action(None, Some("{\"a\":1}")),
    ]);
    let mut stream = Stream::new(streaming([reply])).unwrap();
    let chunks: Vec<String> = stream
        .run(["1 + 1"])
        .map(|chunk| chunk.unwrap().value)
        .collect()
        .await;
    assert_eq!(
        chunks,
        ["Let me add.", "\ncalc.add (call_1)", "{\"a\":1}", "\n"]
    );
}

#[tokio::test]
async fn small_capacity_still_delivers_everything() {
    let structure = streaming([Script::chunks(["a", "b", "c", "d", "e"])]);
    let mut stream = Stream::with_capacity(structure, 1).unwrap();
    let text: String = stream
        .run(["go"])
        .map(|chunk| chunk.unwrap().value)
        .collect::<Vec<_>>()
        .await
        .concat();
    assert_eq!(text, "abcde\n");
}

#[test]
fn requires_a_streaming_driver() {
    let scripted = ScriptedDriver::new("gpt-4o");
    let agent = Structure::agent(Driver::new(scripted));
    assert!(matches!(Stream::new(agent), Err(Error::StreamingDisabled)));
}
