//! Tests for control-flow selection inside workflows.

use futures_util::future::BoxFuture;
use model::{Driver, DummyDriver, Retry};
use std::sync::Arc;
use trellis_runtime::{
    Artifact, Context, ControlFlowTask, Input, Outcome, Selection, Structure, Task, TaskArtifact,
    TaskId, TaskState,
};

struct Fixed(TaskId, &'static str);

impl Task for Fixed {
    fn id(&self) -> &TaskId {
        &self.0
    }

    fn kind(&self) -> &'static str {
        "Fixed"
    }

    fn run<'a>(&'a self, _: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async move { Ok(Outcome::Output(Artifact::text(self.1))) })
    }
}

fn fixed(id: &str, text: &'static str) -> Fixed {
    Fixed(id.into(), text)
}

/// start -> cf -> {a, b}
fn branching(
    decide: impl Fn(Input<'_>) -> (Selection, Artifact) + Send + Sync + 'static,
) -> Structure {
    let driver = Driver::new(DummyDriver).with_retry(Retry::none());
    let mut workflow = Structure::workflow(driver);
    workflow.add_task(fixed("start", "go")).unwrap();
    workflow
        .insert_task(ControlFlowTask::new(decide).with_id("cf"), &["start"])
        .unwrap();
    workflow.insert_task(fixed("a", "A"), &["cf"]).unwrap();
    workflow.insert_task(fixed("b", "B"), &["cf"]).unwrap();
    workflow
}

#[tokio::test]
async fn runs_selected_child_and_cancels_the_rest() {
    let mut workflow = branching(|_| ("b".into(), Artifact::text("picked b")));
    workflow.run(["x"]).await.unwrap();

    assert_eq!(workflow.output("cf"), Some(&Artifact::text("picked b")));
    let expected: Artifact = TaskArtifact::new("b").into();
    assert_eq!(workflow.control_flow_output("cf"), Some(&expected));
    assert_eq!(workflow.state("a"), Some(TaskState::Cancelled));
    assert_eq!(workflow.state("b"), Some(TaskState::Finished));
    assert_eq!(workflow.output("a"), None);
}

#[tokio::test]
async fn decision_sees_single_parent() {
    let mut workflow = branching(|input| match input {
        Input::Single(parent) if parent.output_text() == "go" => {
            ("a".into(), Artifact::text("go"))
        }
        _ => ("b".into(), Artifact::text("other")),
    });
    workflow.run(["x"]).await.unwrap();
    assert_eq!(workflow.state("a"), Some(TaskState::Finished));
    assert_eq!(workflow.state("b"), Some(TaskState::Cancelled));
}

#[tokio::test]
async fn selecting_several_gives_a_list() {
    let mut workflow = branching(|_| (vec!["a", "b"].into(), Artifact::text("both")));
    workflow.run(["x"]).await.unwrap();

    let expected = Artifact::list(vec![
        TaskArtifact::new("a").into(),
        TaskArtifact::new("b").into(),
    ]);
    assert_eq!(workflow.control_flow_output("cf"), Some(&expected));
    assert_eq!(workflow.state("a"), Some(TaskState::Finished));
    assert_eq!(workflow.state("b"), Some(TaskState::Finished));
}

#[tokio::test]
async fn invalid_selection_is_an_error_and_leaves_children_alone() {
    let mut workflow = branching(|_| ("start".into(), Artifact::text("wrong")));
    workflow.run(["x"]).await.unwrap();

    assert_eq!(
        workflow.output("cf"),
        Some(&Artifact::error("ControlFlowTask cf did not return a valid child task"))
    );
    assert_eq!(workflow.control_flow_output("cf"), None);
    assert_eq!(workflow.state("a"), Some(TaskState::Finished));
    assert_eq!(workflow.state("b"), Some(TaskState::Finished));
}

#[tokio::test]
async fn unknown_id_is_an_error() {
    let mut workflow = branching(|_| ("missing".into(), Artifact::text("wrong")));
    workflow.run(["x"]).await.unwrap();
    assert_eq!(
        workflow.output("cf"),
        Some(&Artifact::error("task missing not found"))
    );
}

#[tokio::test]
async fn empty_selection_cancels_children() {
    let mut workflow = branching(|_| (Selection::none(), Artifact::text("none")));
    workflow.run(["x"]).await.unwrap();

    let error = Artifact::error("ControlFlowTask cf did not return any tasks");
    assert_eq!(workflow.output("cf"), Some(&error));
    assert_eq!(workflow.control_flow_output("cf"), Some(&error));
    assert_eq!(workflow.state("a"), Some(TaskState::Cancelled));
    assert_eq!(workflow.state("b"), Some(TaskState::Cancelled));
}

#[tokio::test]
async fn live_reference_selects_by_id() {
    let b: Arc<dyn Task> = Arc::new(fixed("b", "B"));
    let target = b.clone();
    let driver = Driver::new(DummyDriver).with_retry(Retry::none());
    let mut workflow = Structure::workflow(driver);
    workflow.add_task(fixed("start", "go")).unwrap();
    workflow
        .insert_task(
            ControlFlowTask::new(move |_| (target.clone().into(), Artifact::text("live")))
                .with_id("cf"),
            &["start"],
        )
        .unwrap();
    workflow.insert_task(fixed("a", "A"), &["cf"]).unwrap();
    workflow.insert_shared(b, &["cf"]).unwrap();

    workflow.run(["x"]).await.unwrap();
    let expected: Artifact = TaskArtifact::new("b").into();
    assert_eq!(workflow.control_flow_output("cf"), Some(&expected));
    assert_eq!(workflow.state("a"), Some(TaskState::Cancelled));
}

#[tokio::test]
async fn deselected_child_waits_for_pending_parents() {
    let driver = Driver::new(DummyDriver).with_retry(Retry::none());
    let mut workflow = Structure::workflow(driver);
    workflow.add_task(fixed("start", "go")).unwrap();
    workflow
        .insert_task(
            ControlFlowTask::new(|_| ("a".into(), Artifact::text("a"))).with_id("cf"),
            &["start"],
        )
        .unwrap();
    workflow.insert_task(fixed("a", "A"), &["cf"]).unwrap();
    workflow.insert_task(fixed("other", "O"), &["start"]).unwrap();
    workflow.insert_task(fixed("joined", "J"), &["cf", "other"]).unwrap();

    workflow.run(["x"]).await.unwrap();
    assert_eq!(workflow.state("other"), Some(TaskState::Finished));
    assert_eq!(workflow.state("joined"), Some(TaskState::Finished));
}

#[tokio::test]
async fn deselected_child_is_cancelled_when_other_parents_finished() {
    let driver = Driver::new(DummyDriver).with_retry(Retry::none());
    let mut workflow = Structure::workflow(driver);
    workflow.add_task(fixed("start", "go")).unwrap();
    workflow.insert_task(fixed("other", "O"), &["start"]).unwrap();
    workflow
        .insert_task(
            ControlFlowTask::new(|_| ("a".into(), Artifact::text("a"))).with_id("cf"),
            &["start"],
        )
        .unwrap();
    workflow.insert_task(fixed("a", "A"), &["cf"]).unwrap();
    workflow.insert_task(fixed("joined", "J"), &["cf", "other"]).unwrap();

    workflow.run(["x"]).await.unwrap();
    assert_eq!(workflow.state("other"), Some(TaskState::Finished));
    assert_eq!(workflow.state("joined"), Some(TaskState::Cancelled));
}

#[tokio::test]
async fn cancellation_propagates_downstream() {
    let mut workflow = branching(|_| ("b".into(), Artifact::text("b")));
    workflow.insert_task(fixed("after_a", "AA"), &["a"]).unwrap();
    workflow.run(["x"]).await.unwrap();
    assert_eq!(workflow.state("after_a"), Some(TaskState::Cancelled));
}

#[tokio::test]
async fn join_runs_when_one_branch_was_cancelled() {
    let mut workflow = branching(|_| ("b".into(), Artifact::text("b")));
    workflow.insert_task(fixed("join", "J"), &["a", "b"]).unwrap();
    workflow.run(["x"]).await.unwrap();
    assert_eq!(workflow.state("a"), Some(TaskState::Cancelled));
    assert_eq!(workflow.state("join"), Some(TaskState::Finished));
    assert_eq!(workflow.output("join"), Some(&Artifact::text("J")));
}
