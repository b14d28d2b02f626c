use super::{
    Context, DEFAULT_INPUT_TEMPLATE, Outcome, Task, TaskId, new_task_id, prompt::build_stack,
    render_input,
};
use crate::{Artifact, Ruleset, prompt};
use anyhow::bail;
use futures_util::future::BoxFuture;
use model::Driver;
use serde_json::Value;
use std::{future::Future, sync::Arc};
use tcore::{ActionCall, ActionResult, Content, Message, Role, ToolSpec};

/// Default cap on model round trips within one toolkit run.
pub const DEFAULT_MAX_SUBTASKS: usize = 20;

/// A type-erased async tool handler.
pub type Handler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// A tool activity and the handler that performs it.
#[derive(Clone)]
pub struct Tool {
    spec: ToolSpec,
    handler: Handler,
}

impl Tool {
    /// Pair a spec with its handler.
    pub fn new<F, Fut>(spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |input| Box::pin(handler(input)));
        Self { spec, handler }
    }

    /// The tool spec.
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }
}

/// A prompt task that lets the model call tools until it answers.
pub struct ToolkitTask {
    id: TaskId,
    template: String,
    rulesets: Vec<Ruleset>,
    tools: Vec<Tool>,
    max_subtasks: usize,
    driver: Option<Driver>,
}

impl ToolkitTask {
    /// Create a toolkit task rendering `template`.
    pub fn new(template: impl Into<String>, tools: Vec<Tool>) -> Self {
        Self {
            id: new_task_id(),
            template: template.into(),
            rulesets: Vec::new(),
            tools,
            max_subtasks: DEFAULT_MAX_SUBTASKS,
            driver: None,
        }
    }

    /// A toolkit task over the first run argument.
    pub fn with_tools(tools: Vec<Tool>) -> Self {
        Self::new(DEFAULT_INPUT_TEMPLATE, tools)
    }

    /// Set the task id.
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a task-level ruleset.
    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.rulesets.push(ruleset);
        self
    }

    /// Cap the model round trips.
    pub fn max_subtasks(mut self, max_subtasks: usize) -> Self {
        self.max_subtasks = max_subtasks;
        self
    }

    /// Use this driver instead of the structure's.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Run every call, in order, collecting the results.
    async fn dispatch(&self, calls: Vec<ActionCall>) -> Vec<Content> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let tool = self
                .tools
                .iter()
                .find(|t| t.spec.name == call.name && t.spec.path == call.path);
            let output = match tool {
                Some(tool) => match (tool.handler)(call.input.clone()).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!("tool {}.{} failed: {e}", call.name, call.path);
                        format!("error: {e}")
                    }
                },
                None => format!("error: tool {}.{} not found", call.name, call.path),
            };
            results.push(Content::ActionResult(ActionResult {
                tag: call.tag,
                name: call.name,
                path: call.path,
                output,
            }));
        }
        results
    }
}

impl Task for ToolkitTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "ToolkitTask"
    }

    fn run<'a>(&'a self, ctx: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async move {
            let input = render_input(&self.template, ctx)?;
            tracing::info!("{} {}\nInput: {input}", self.kind(), self.id);

            let driver = self.driver.as_ref().unwrap_or(ctx.driver());
            let specs = self.tools.iter().map(|t| t.spec.clone()).collect();
            let mut stack = build_stack(ctx, driver, &self.rulesets, specs, input);

            for _ in 0..self.max_subtasks {
                let message = prompt::run(driver, ctx.events(), &stack).await?;
                let calls: Vec<ActionCall> = message.action_calls().cloned().collect();
                if calls.is_empty() {
                    let output = message.text();
                    tracing::info!("{} {}\nOutput: {output}", self.kind(), self.id);
                    return Ok(Outcome::Output(Artifact::text(output)));
                }

                stack.add_message(message);
                let results = self.dispatch(calls).await;
                stack.add_message(Message::new(Role::User, results));
            }

            bail!("exceeded the maximum of {} subtasks", self.max_subtasks);
        })
    }
}
