//! Tests for artifacts.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use trellis_runtime::{
    Artifact, Context, Error, Outcome, Task, TaskArtifact, TaskId, TaskRef,
};

struct Named(TaskId);

impl Task for Named {
    fn id(&self) -> &TaskId {
        &self.0
    }

    fn kind(&self) -> &'static str {
        "Named"
    }

    fn run<'a>(&'a self, _: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async { Ok(Outcome::Output(Artifact::text(""))) })
    }
}

#[test]
fn task_artifact_equality_ignores_the_form() {
    let live: Arc<dyn Task> = Arc::new(Named("summarize".into()));
    let by_ref = TaskArtifact::new(live.clone());
    let by_id = TaskArtifact::new("summarize");

    assert_eq!(by_ref, by_id);
    assert!(by_ref.task().is_some());
    assert!(by_id.task().is_none());
    assert_ne!(by_id, TaskArtifact::new("other"));
    assert!(matches!(by_ref.target, TaskRef::Task(_)));
}

#[test]
fn task_artifact_serializes_as_id() {
    let live: Arc<dyn Task> = Arc::new(Named("t1".into()));
    let artifact: Artifact = TaskArtifact::new(live).into();
    let json = serde_json::to_value(&artifact).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "task", "target": "t1" }));

    let back: Artifact = serde_json::from_value(json).unwrap();
    assert_eq!(back, artifact);
    assert_eq!(back.to_text(), "t1");
}

#[test]
fn concat_with_task_artifact_fails() {
    let task: Artifact = TaskArtifact::new("t1").into();
    let text = Artifact::text("hello");

    assert!(matches!(
        task.concat(&text),
        Err(Error::UnsupportedConcat("TaskArtifact", "TextArtifact"))
    ));
    assert!(matches!(
        text.concat(&task),
        Err(Error::UnsupportedConcat("TextArtifact", "TaskArtifact"))
    ));
}

#[test]
fn concat_joins_text_and_extends_lists() {
    let joined = Artifact::text("foo").concat(&Artifact::text("bar")).unwrap();
    assert_eq!(joined, Artifact::text("foobar"));

    let list = Artifact::list(vec![Artifact::text("a")]);
    let extended = list.concat(&Artifact::text("b")).unwrap();
    assert_eq!(
        extended,
        Artifact::list(vec![Artifact::text("a"), Artifact::text("b")])
    );
    assert_eq!(extended.to_text(), "a\n\nb");

    assert!(Artifact::error("e").concat(&Artifact::text("x")).is_err());
}

#[test]
fn kinds_and_errors() {
    assert!(Artifact::error("bad").is_error());
    assert!(!Artifact::text("ok").is_error());
    assert_eq!(Artifact::list(vec![]).kind(), "ListArtifact");
    assert_eq!(Artifact::list(vec![]).to_text(), "");
}
