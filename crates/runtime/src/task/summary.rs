use super::{Context, DEFAULT_INPUT_TEMPLATE, Outcome, Task, TaskId, new_task_id, render_input};
use crate::{Ruleset, SummaryEngine};
use futures_util::future::BoxFuture;

/// Summarizes its rendered input.
pub struct TextSummaryTask {
    id: TaskId,
    template: String,
    rulesets: Vec<Ruleset>,
    engine: Option<SummaryEngine>,
}

impl Default for TextSummaryTask {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_TEMPLATE)
    }
}

impl TextSummaryTask {
    /// Summarize the rendering of `template`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            template: template.into(),
            rulesets: Vec::new(),
            engine: None,
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

    /// Use this engine instead of one over the structure's driver.
    pub fn with_engine(mut self, engine: SummaryEngine) -> Self {
        self.engine = Some(engine);
        self
    }
}

impl Task for TextSummaryTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "TextSummaryTask"
    }

    fn run<'a>(&'a self, ctx: &'a Context<'a>) -> BoxFuture<'a, anyhow::Result<Outcome>> {
        Box::pin(async move {
            let input = render_input(&self.template, ctx)?;
            tracing::info!("{} {}\nInput: {input}", self.kind(), self.id);

            let engine = match &self.engine {
                Some(engine) => engine.clone(),
                None => SummaryEngine::new(ctx.driver().clone()),
            };
            let rulesets: Vec<Ruleset> = ctx
                .rulesets()
                .iter()
                .chain(&self.rulesets)
                .cloned()
                .collect();
            let output = engine.summarize_text(&input, &rulesets, ctx.events()).await?;

            tracing::info!("{} {}\nOutput: {}", self.kind(), self.id, output.to_text());
            Ok(Outcome::Output(output))
        })
    }
}
