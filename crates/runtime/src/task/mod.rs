//! Tasks: the units of work inside a structure.

use crate::{
    Artifact, ConversationMemory, EventBus, Ruleset, TaskArtifact, TaskRef,
};
use compact_str::CompactString;
use futures_util::future::BoxFuture;
use model::Driver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use control_flow::ControlFlowTask;
pub use prompt::PromptTask;
pub use summary::TextSummaryTask;
pub use toolkit::{DEFAULT_MAX_SUBTASKS, Handler, Tool, ToolkitTask};

mod control_flow;
mod prompt;
mod summary;
mod toolkit;

/// Identifier of a task, unique within a structure.
pub type TaskId = CompactString;

/// A fresh task id: a lowercase ULID.
pub fn new_task_id() -> TaskId {
    ulid::Ulid::new().to_string().to_lowercase().into()
}

/// Lifecycle state of a task within one run.
///
/// `Pending` moves to `Executing` then `Finished`, or straight to
/// `Cancelled`. Only the structure moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not yet run.
    #[default]
    Pending,
    /// Running now.
    Executing,
    /// Ran, output set.
    Finished,
    /// Will not run in this run.
    Cancelled,
}

impl TaskState {
    /// Finished or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// A unit of work.
///
/// Implementations hold configuration only; per-run state lives in the
/// structure and reaches the task through its [`Context`].
pub trait Task: Send + Sync + 'static {
    /// The task id.
    fn id(&self) -> &TaskId;

    /// A short kind name, e.g. `PromptTask`.
    fn kind(&self) -> &'static str;

    /// Run the task once.
    fn run<'a>(&'a self, ctx: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>>;
}

/// What a task run produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A plain output.
    Output(Artifact),
    /// A control-flow decision, applied by the structure.
    Branch(Branch),
}

/// A control-flow decision.
#[derive(Debug, Clone)]
pub struct Branch {
    /// The children to run.
    pub selected: Selection,
    /// The output of the deciding task.
    pub output: Artifact,
}

/// Zero, one or many selected tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection(Vec<TaskRef>);

impl Selection {
    /// Select nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The selected tasks, in order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskRef> {
        self.0.iter()
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Self(vec![value.into()])
    }
}

impl From<TaskId> for Selection {
    fn from(value: TaskId) -> Self {
        Self(vec![value.into()])
    }
}

impl From<TaskRef> for Selection {
    fn from(value: TaskRef) -> Self {
        Self(vec![value])
    }
}

impl From<Arc<dyn Task>> for Selection {
    fn from(value: Arc<dyn Task>) -> Self {
        Self(vec![value.into()])
    }
}

impl<T: Into<TaskRef>> From<Vec<T>> for Selection {
    fn from(value: Vec<T>) -> Self {
        Self(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Selection>> From<Option<T>> for Selection {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Read-only view of another task during a run.
#[derive(Clone, Copy)]
pub struct TaskView<'a> {
    pub(crate) task: &'a Arc<dyn Task>,
    pub(crate) state: TaskState,
    pub(crate) output: Option<&'a Artifact>,
}

impl<'a> TaskView<'a> {
    /// The task id.
    pub fn id(&self) -> &'a TaskId {
        self.task.id()
    }

    /// The task kind.
    pub fn kind(&self) -> &'static str {
        self.task.kind()
    }

    /// The task's state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The task's output in this run, if it finished.
    pub fn output(&self) -> Option<&'a Artifact> {
        self.output
    }

    /// Output text, empty if there is none.
    pub fn output_text(&self) -> String {
        self.output.map(Artifact::to_text).unwrap_or_default()
    }

    /// A live reference to the task.
    pub fn task_ref(&self) -> TaskRef {
        TaskRef::Task(self.task.clone())
    }

    /// A task artifact referencing this task.
    pub fn to_artifact(&self) -> TaskArtifact {
        TaskArtifact::new(self.task_ref())
    }
}

impl std::fmt::Debug for TaskView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskView")
            .field("id", self.id())
            .field("state", &self.state)
            .field("output", &self.output)
            .finish()
    }
}

impl From<&TaskView<'_>> for TaskRef {
    fn from(value: &TaskView<'_>) -> Self {
        value.task_ref()
    }
}

impl From<TaskView<'_>> for TaskRef {
    fn from(value: TaskView<'_>) -> Self {
        value.task_ref()
    }
}

/// The parents of a task, shaped by how many there are.
#[derive(Debug, Clone)]
pub enum Input<'a> {
    /// No parents.
    Empty,
    /// Exactly one parent.
    Single(TaskView<'a>),
    /// Several parents, in declaration order.
    Many(Vec<TaskView<'a>>),
}

/// Everything a task may read while it runs.
pub struct Context<'a> {
    pub(crate) task_id: &'a TaskId,
    pub(crate) args: &'a [String],
    pub(crate) parents: Vec<TaskView<'a>>,
    pub(crate) driver: &'a Driver,
    pub(crate) events: &'a EventBus,
    pub(crate) memory: Option<&'a ConversationMemory>,
    pub(crate) rulesets: &'a [Ruleset],
}

impl<'a> Context<'a> {
    /// Id of the running task.
    pub fn task_id(&self) -> &TaskId {
        self.task_id
    }

    /// Arguments of the structure run.
    pub fn args(&self) -> &[String] {
        self.args
    }

    /// Parents in declaration order.
    pub fn parents(&self) -> &[TaskView<'a>] {
        &self.parents
    }

    /// The parents, shaped for control flow.
    pub fn input_views(&self) -> Input<'a> {
        match self.parents.as_slice() {
            [] => Input::Empty,
            [parent] => Input::Single(*parent),
            parents => Input::Many(parents.to_vec()),
        }
    }

    /// The parents as an artifact.
    ///
    /// One parent gives its task artifact, several give a list of them in
    /// declaration order, none gives an empty list.
    pub fn input(&self) -> Artifact {
        match self.parents.as_slice() {
            [parent] => parent.to_artifact().into(),
            parents => Artifact::list(
                parents
                    .iter()
                    .map(|p| Artifact::from(p.to_artifact()))
                    .collect(),
            ),
        }
    }

    /// Outputs of the finished parents, in declaration order.
    pub fn parent_outputs(&self) -> Vec<&'a Artifact> {
        self.parents.iter().filter_map(TaskView::output).collect()
    }

    /// The structure's prompt driver.
    pub fn driver(&self) -> &'a Driver {
        self.driver
    }

    /// The structure's event bus.
    pub fn events(&self) -> &'a EventBus {
        self.events
    }

    /// Conversation memory, when enabled.
    pub fn memory(&self) -> Option<&'a ConversationMemory> {
        self.memory
    }

    /// Structure-wide rulesets.
    pub fn rulesets(&self) -> &'a [Ruleset] {
        self.rulesets
    }

    /// Template variables for rendering task input.
    pub(crate) fn template_vars(&self) -> minijinja::Value {
        let outputs: Vec<String> = self
            .parent_outputs()
            .into_iter()
            .map(Artifact::to_text)
            .collect();
        let parent_output = match self.parents.as_slice() {
            [parent] => parent.output_text(),
            _ => String::new(),
        };
        minijinja::context! {
            args => self.args,
            parent_output => parent_output,
            parents_output_text => outputs.join("\n\n"),
        }
    }
}

/// Default input template: the first run argument.
pub const DEFAULT_INPUT_TEMPLATE: &str = "{{ args[0] }}";

/// Render an input template against the run context.
pub(crate) fn render_input(template: &str, ctx: &Context<'_>) -> anyhow::Result<String> {
    let env = minijinja::Environment::new();
    Ok(env.render_str(template, ctx.template_vars())?)
}
