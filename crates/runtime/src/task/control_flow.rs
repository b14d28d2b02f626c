use super::{Branch, Context, Input, Outcome, Selection, Task, TaskId, new_task_id};
use crate::Artifact;
use futures_util::future::BoxFuture;
use std::sync::Arc;

type Decide = dyn Fn(Input<'_>) -> (Selection, Artifact) + Send + Sync;

/// Chooses which of its children run.
///
/// The decision function sees the parents and returns the selected
/// children with an output artifact. The structure validates the
/// selection and cancels the children left out.
pub struct ControlFlowTask {
    id: TaskId,
    decide: Arc<Decide>,
}

impl ControlFlowTask {
    /// Create a control-flow task with a generated id.
    pub fn new<F>(decide: F) -> Self
    where
        F: Fn(Input<'_>) -> (Selection, Artifact) + Send + Sync + 'static,
    {
        Self {
            id: new_task_id(),
            decide: Arc::new(decide),
        }
    }

    /// Set the task id.
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }
}

impl Task for ControlFlowTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "ControlFlowTask"
    }

    fn run<'a>(&'a self, ctx: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async move {
            tracing::info!("{} {}\nInput: {}", self.kind(), self.id, ctx.input().to_text());
            let (selected, output) = (self.decide)(ctx.input_views());
            Ok(Outcome::Branch(Branch { selected, output }))
        })
    }
}
