use super::{Context, DEFAULT_INPUT_TEMPLATE, Outcome, Task, TaskId, new_task_id, render_input};
use crate::{Artifact, Ruleset, prompt, rules};
use futures_util::future::BoxFuture;
use model::Driver;
use tcore::{PromptStack, ToolSpec};

/// Sends its rendered input to the model and outputs the reply text.
pub struct PromptTask {
    id: TaskId,
    template: String,
    rulesets: Vec<Ruleset>,
    driver: Option<Driver>,
}

impl Default for PromptTask {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_TEMPLATE)
    }
}

impl PromptTask {
    /// Create a prompt task rendering `template`.
    ///
    /// The template sees `args`, `parent_output` and
    /// `parents_output_text`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            template: template.into(),
            rulesets: Vec::new(),
            driver: None,
        }
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

    /// Use this driver instead of the structure's.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    /// The input template.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Task for PromptTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "PromptTask"
    }

    fn run<'a>(&'a self, ctx: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async move {
            let input = render_input(&self.template, ctx)?;
            tracing::info!("{} {}\nInput: {input}", self.kind(), self.id);

            let driver = self.driver.as_ref().unwrap_or(ctx.driver());
            let stack = build_stack(ctx, driver, &self.rulesets, Vec::new(), input);
            let message = prompt::run(driver, ctx.events(), &stack).await?;

            let output = message.text();
            tracing::info!("{} {}\nOutput: {output}", self.kind(), self.id);
            Ok(Outcome::Output(Artifact::text(output)))
        })
    }
}

/// System prompt from the rulesets, remembered runs, then the input.
pub(super) fn build_stack(
    ctx: &Context<'_>,
    driver: &Driver,
    rulesets: &[Ruleset],
    tools: Vec<ToolSpec>,
    input: String,
) -> PromptStack {
    let mut stack = PromptStack::new().with_tools(tools);
    let system = rules::render(ctx.rulesets().iter().chain(rulesets));
    if !system.is_empty() {
        stack.add_system(system);
    }
    stack.add_user(input);

    if let Some(memory) = ctx.memory() {
        let index = stack.system_messages().count();
        memory.add_to_stack(&mut stack, &driver.tokenizer(), index);
    }
    stack
}
