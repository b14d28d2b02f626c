//! Structures: agents, pipelines and workflows of tasks.

use crate::{
    Artifact, Branch, ConversationMemory, Context, Error, Event, EventBus, EventListener,
    ListenerId, Outcome, PromptTask, Result, Ruleset, Run, StructureConfig, Task, TaskArtifact,
    TaskId, TaskRef, TaskState, TaskView, Tool, ToolkitTask,
};
use model::Driver;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

/// How a structure wires and reports its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// A single prompt or toolkit task.
    Agent,
    /// A chain; each added task follows the previous one.
    Pipeline,
    /// An explicit graph.
    Workflow,
}

/// A task in the graph with its per-run state.
struct Node {
    task: Arc<dyn Task>,
    parents: Vec<TaskId>,
    children: Vec<TaskId>,
    state: TaskState,
    output: Option<Artifact>,
    control_output: Option<Artifact>,
    /// Parents that finished without selecting this task.
    deselected_by: BTreeSet<TaskId>,
}

impl Node {
    fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            parents: Vec::new(),
            children: Vec::new(),
            state: TaskState::Pending,
            output: None,
            control_output: None,
            deselected_by: BTreeSet::new(),
        }
    }

    fn reset(&mut self) {
        self.state = TaskState::Pending;
        self.output = None;
        self.control_output = None;
        self.deselected_by.clear();
    }
}

enum Readiness {
    Run,
    Wait,
    Cancel,
}

/// A graph of tasks sharing a driver, events, rulesets and memory.
pub struct Structure {
    kind: StructureKind,
    nodes: Vec<Node>,
    index: HashMap<TaskId, usize>,
    driver: Driver,
    events: EventBus,
    rulesets: Vec<Ruleset>,
    memory: Option<ConversationMemory>,
}

impl Structure {
    fn empty(kind: StructureKind, driver: Driver) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            index: HashMap::new(),
            driver,
            events: EventBus::new(),
            rulesets: Vec::new(),
            memory: Some(ConversationMemory::new()),
        }
    }

    /// An agent answering the first run argument.
    pub fn agent(driver: Driver) -> Self {
        Self::agent_with_task(driver, PromptTask::default())
    }

    /// An agent that may call `tools` while answering.
    pub fn agent_with_tools(driver: Driver, tools: Vec<Tool>) -> Self {
        Self::agent_with_task(driver, ToolkitTask::with_tools(tools))
    }

    /// An agent running `task`.
    pub fn agent_with_task(driver: Driver, task: impl Task) -> Self {
        let mut structure = Self::empty(StructureKind::Agent, driver);
        structure.push(Arc::new(task));
        structure
    }

    /// An empty pipeline.
    pub fn pipeline(driver: Driver) -> Self {
        Self::empty(StructureKind::Pipeline, driver)
    }

    /// An empty workflow.
    pub fn workflow(driver: Driver) -> Self {
        Self::empty(StructureKind::Workflow, driver)
    }

    /// A structure configured from `config`, its driver built over `client`.
    pub fn from_config(
        kind: StructureKind,
        config: &StructureConfig,
        client: reqwest::Client,
    ) -> Result<Self> {
        let driver = config
            .driver(client)
            .map_err(|e| Error::InvalidConfig(format!("{e:#}")))?;
        let mut structure = match kind {
            StructureKind::Agent => Self::agent(driver),
            StructureKind::Pipeline => Self::pipeline(driver),
            StructureKind::Workflow => Self::workflow(driver),
        };
        structure.rulesets = config.rulesets.clone();
        structure.memory = config.conversation_memory.build();
        Ok(structure)
    }

    /// Add a structure-wide ruleset.
    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.rulesets.push(ruleset);
        self
    }

    /// Replace the conversation memory; `None` disables it.
    pub fn with_memory(mut self, memory: Option<ConversationMemory>) -> Self {
        self.memory = memory;
        self
    }

    /// The structure kind.
    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    /// The prompt driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Structure-wide rulesets.
    pub fn rulesets(&self) -> &[Ruleset] {
        &self.rulesets
    }

    /// Conversation memory, when enabled.
    pub fn memory(&self) -> Option<&ConversationMemory> {
        self.memory.as_ref()
    }

    /// Mutable conversation memory, when enabled.
    pub fn memory_mut(&mut self) -> Option<&mut ConversationMemory> {
        self.memory.as_mut()
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<dyn Task>> {
        self.nodes.iter().map(|n| &n.task)
    }

    /// Add a task. In a pipeline or agent it follows the last task.
    pub fn add_task(&mut self, task: impl Task) -> Result<TaskId> {
        self.add_shared(Arc::new(task))
    }

    /// Add a task already behind an `Arc`.
    pub fn add_shared(&mut self, task: Arc<dyn Task>) -> Result<TaskId> {
        let previous = match self.kind {
            StructureKind::Workflow => None,
            _ => self.nodes.last().map(|n| n.task.id().clone()),
        };
        let id = self.register(task)?;
        if let Some(previous) = previous {
            self.link(&previous, &id)?;
        }
        Ok(id)
    }

    /// Add a task as a child of `parents`.
    pub fn insert_task(&mut self, task: impl Task, parents: &[&str]) -> Result<TaskId> {
        self.insert_shared(Arc::new(task), parents)
    }

    /// Add a shared task as a child of `parents`.
    pub fn insert_shared(&mut self, task: Arc<dyn Task>, parents: &[&str]) -> Result<TaskId> {
        if let Some(missing) = parents.iter().find(|p| !self.index.contains_key(**p)) {
            return Err(Error::TaskNotFound((*missing).into()));
        }
        let id = self.register(task)?;
        for parent in parents {
            self.link(parent, &id)?;
        }
        Ok(id)
    }

    /// Make `child` depend on `parent`.
    pub fn link(&mut self, parent: &str, child: &str) -> Result<()> {
        let p = self.position(parent)?;
        let c = self.position(child)?;
        if self.nodes[p].children.iter().any(|id| id == child) {
            return Ok(());
        }
        if p == c || self.reaches(c, p) {
            return Err(Error::Cycle {
                parent: parent.into(),
                child: child.into(),
            });
        }

        self.nodes[p].children.push(child.into());
        self.nodes[c].parents.push(parent.into());
        Ok(())
    }

    /// Find a task by id.
    pub fn find_task(&self, id: &str) -> Option<&Arc<dyn Task>> {
        self.node(id).map(|n| &n.task)
    }

    /// Parent ids of a task, in link order.
    pub fn parents(&self, id: &str) -> Result<&[TaskId]> {
        Ok(&self.nodes[self.position(id)?].parents)
    }

    /// Child ids of a task, in link order.
    pub fn children(&self, id: &str) -> Result<&[TaskId]> {
        Ok(&self.nodes[self.position(id)?].children)
    }

    /// State of a task in the last run.
    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.node(id).map(|n| n.state)
    }

    /// Output of a task in the last run.
    pub fn output(&self, id: &str) -> Option<&Artifact> {
        self.node(id).and_then(|n| n.output.as_ref())
    }

    /// The selection a control-flow task made in the last run.
    pub fn control_flow_output(&self, id: &str) -> Option<&Artifact> {
        self.node(id).and_then(|n| n.control_output.as_ref())
    }

    /// Subscribe to events.
    pub fn add_event_listener(&mut self, listener: EventListener) -> ListenerId {
        self.events.add(listener)
    }

    /// Unsubscribe, returning whether the listener was registered.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }

    /// Run every task once and return the structure output.
    ///
    /// Task failures become error outputs; every task ends the run
    /// finished or cancelled.
    pub async fn run<S: Into<String>>(
        &mut self,
        args: impl IntoIterator<Item = S>,
    ) -> Result<Option<Artifact>> {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.nodes.iter_mut().for_each(Node::reset);
        tracing::debug!("running {:?} with {} tasks", self.kind, self.nodes.len());
        self.events
            .publish(Event::StartStructureRun { args: args.clone() })
            .await;

        while let Some(i) = self.next_ready() {
            self.execute(i, &args).await;
        }
        for node in self.nodes.iter_mut().filter(|n| !n.state.is_terminal()) {
            node.state = TaskState::Cancelled;
        }

        let output = self.structure_output();
        if let (Some(memory), Some(output)) = (self.memory.as_mut(), output.as_ref()) {
            memory.add_run(Run::new(args.join(" "), output.to_text()));
        }

        self.events
            .publish(Event::FinishStructureRun {
                output: output.as_ref().map(Artifact::to_text),
            })
            .await;
        Ok(output)
    }

    fn register(&mut self, task: Arc<dyn Task>) -> Result<TaskId> {
        let id = task.id().clone();
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateTask(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node::new(task));
        Ok(id)
    }

    fn push(&mut self, task: Arc<dyn Task>) {
        let id = task.id().clone();
        self.index.insert(id, self.nodes.len());
        self.nodes.push(Node::new(task));
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::TaskNotFound(id.into()))
    }

    fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Whether `to` is reachable from `from` along child edges.
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(i) = stack.pop() {
            if i == to {
                return true;
            }
            if !seen.insert(i) {
                continue;
            }
            stack.extend(self.nodes[i].children.iter().filter_map(|c| self.index.get(c).copied()));
        }
        false
    }

    fn readiness(&self, i: usize) -> Readiness {
        let node = &self.nodes[i];
        if node.parents.is_empty() {
            return Readiness::Run;
        }

        let mut live = false;
        for parent in &node.parents {
            let Some(p) = self.node(parent) else {
                continue;
            };
            if !p.state.is_terminal() {
                return Readiness::Wait;
            }
            live |= p.state == TaskState::Finished && !node.deselected_by.contains(parent);
        }
        if live {
            Readiness::Run
        } else {
            Readiness::Cancel
        }
    }

    /// First ready task in insertion order, cancelling unreachable ones.
    fn next_ready(&mut self) -> Option<usize> {
        loop {
            let mut cancelled = false;
            for i in 0..self.nodes.len() {
                if self.nodes[i].state != TaskState::Pending {
                    continue;
                }
                match self.readiness(i) {
                    Readiness::Run => return Some(i),
                    Readiness::Wait => {}
                    Readiness::Cancel => {
                        tracing::debug!("cancelling task {}", self.nodes[i].task.id());
                        self.nodes[i].state = TaskState::Cancelled;
                        cancelled = true;
                    }
                }
            }
            if !cancelled {
                return None;
            }
        }
    }

    fn views(&self, i: usize) -> Vec<TaskView<'_>> {
        self.nodes[i]
            .parents
            .iter()
            .filter_map(|id| self.node(id))
            .map(|p| TaskView {
                task: &p.task,
                state: p.state,
                output: p.output.as_ref(),
            })
            .collect()
    }

    async fn execute(&mut self, i: usize, args: &[String]) {
        let task = self.nodes[i].task.clone();
        self.nodes[i].state = TaskState::Executing;
        self.events
            .publish(Event::StartTask {
                task_id: task.id().clone(),
                kind: task.kind(),
            })
            .await;

        let result = {
            let ctx = Context {
                task_id: task.id(),
                args,
                parents: self.views(i),
                driver: &self.driver,
                events: &self.events,
                memory: self.memory.as_ref(),
                rulesets: &self.rulesets,
            };
            task.run(&ctx).await
        };

        let (output, control_output) = match result {
            Ok(Outcome::Output(output)) => (output, None),
            Ok(Outcome::Branch(branch)) => self.apply_branch(i, branch),
            Err(e) => {
                let message = format!("{} {} failed: {e:#}", task.kind(), task.id());
                tracing::error!("{message}");
                (Artifact::error(message), None)
            }
        };

        let node = &mut self.nodes[i];
        node.state = TaskState::Finished;
        node.control_output = control_output;
        let event = Event::FinishTask {
            task_id: task.id().clone(),
            output: output.to_text(),
            error: output.is_error(),
        };
        node.output = Some(output);
        self.events.publish(event).await;
    }

    /// Validate a control-flow decision and deselect the children left out.
    ///
    /// Returns the task output and its control output.
    fn apply_branch(&mut self, i: usize, branch: Branch) -> (Artifact, Option<Artifact>) {
        let id = self.nodes[i].task.id().clone();
        let children = self.nodes[i].children.clone();

        if branch.selected.is_empty() {
            let error = Artifact::error(Error::EmptySelection(id.clone()).to_string());
            for child in &children {
                self.deselect(&id, child);
            }
            return (error.clone(), Some(error));
        }

        let mut selected = Vec::new();
        for target in branch.selected.iter() {
            let child = target.task_id();
            if matches!(target, TaskRef::Id(_)) && !self.index.contains_key(child) {
                return (Artifact::error(Error::TaskNotFound(child.clone()).to_string()), None);
            }
            if !children.contains(child) {
                return (Artifact::error(Error::InvalidSelection(id).to_string()), None);
            }
            selected.push(child.clone());
        }

        for child in children.iter().filter(|c| !selected.contains(c)) {
            self.deselect(&id, child);
        }

        let mut artifacts: Vec<Artifact> = selected
            .iter()
            .filter_map(|child| self.find_task(child))
            .map(|task| TaskArtifact::new(task.clone()).into())
            .collect();
        let control_output = if artifacts.len() == 1 {
            artifacts.remove(0)
        } else {
            Artifact::list(artifacts)
        };
        (branch.output, Some(control_output))
    }

    /// Mark `child` as deselected by `parent`, cancelling it when no other
    /// parent is still to finish.
    fn deselect(&mut self, parent: &TaskId, child: &TaskId) {
        let Some(&c) = self.index.get(child) else {
            return;
        };
        let others_finished = self.nodes[c]
            .parents
            .iter()
            .filter(|p| *p != parent)
            .all(|p| self.state(p) == Some(TaskState::Finished));

        let node = &mut self.nodes[c];
        node.deselected_by.insert(parent.clone());
        if others_finished && node.state == TaskState::Pending {
            tracing::debug!("task {parent} deselected {child}, cancelling it");
            node.state = TaskState::Cancelled;
        }
    }

    fn structure_output(&self) -> Option<Artifact> {
        match self.kind {
            StructureKind::Agent | StructureKind::Pipeline => {
                self.nodes.last().and_then(|n| n.output.clone())
            }
            StructureKind::Workflow => {
                let leaves: Vec<&Node> =
                    self.nodes.iter().filter(|n| n.children.is_empty()).collect();
                if let [leaf] = leaves.as_slice() {
                    return leaf.output.clone();
                }
                let outputs: Vec<Artifact> =
                    leaves.iter().filter_map(|n| n.output.clone()).collect();
                (!outputs.is_empty()).then(|| Artifact::list(outputs))
            }
        }
    }
}

impl std::fmt::Debug for Structure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Structure")
            .field("kind", &self.kind)
            .field("tasks", &self.nodes.iter().map(|n| n.task.id()).collect::<Vec<_>>())
            .field("driver", &self.driver)
            .field("listeners", &self.events.len())
            .finish()
    }
}
