//! Workflow example: a control-flow task routes a question to one of two
//! prompt tasks, and a summary task condenses the answer.
//!
//! Requires OPENAI_API_KEY (or TRELLIS_CONFIG). Run with:
//! ```sh
//! cargo run -p trellis-runtime --example workflow -- "What is 12 * 7?"
//! ```

mod common;

use trellis_runtime::{
    Artifact, ControlFlowTask, Input, PromptTask, Rule, Ruleset, Structure, StructureKind,
    TextSummaryTask,
};

#[tokio::main]
async fn main() {
    common::init_tracing();
    let config = common::load_config();
    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is 12 * 7?".into());

    let mut workflow = Structure::from_config(StructureKind::Workflow, &config, model::Client::new())
        .expect("failed to build workflow")
        .with_ruleset(Ruleset::new("style", [Rule::new("Answer in plain English.")]));

    let classify = workflow
        .add_task(PromptTask::new(
            "Reply with exactly one word, math or prose, for this question: {{ args[0] }}",
        ))
        .expect("add classify");
    let route = workflow
        .insert_task(
            ControlFlowTask::new(|input| {
                let label = match input {
                    Input::Single(parent) => parent.output_text().to_lowercase(),
                    _ => String::new(),
                };
                let target = if label.contains("math") { "math" } else { "prose" };
                (target.into(), Artifact::text(label))
            })
            .with_id("route"),
            &[classify.as_str()],
        )
        .expect("add route");
    workflow
        .insert_task(
            PromptTask::new("Solve step by step: {{ args[0] }}").with_id("math"),
            &[route.as_str()],
        )
        .expect("add math");
    workflow
        .insert_task(
            PromptTask::new("Answer thoughtfully: {{ args[0] }}").with_id("prose"),
            &[route.as_str()],
        )
        .expect("add prose");
    workflow
        .insert_task(
            TextSummaryTask::new("{{ parents_output_text }}").with_id("summary"),
            &["math", "prose"],
        )
        .expect("add summary");

    match workflow.run([question]).await {
        Ok(Some(output)) => println!("{}", output.to_text()),
        Ok(None) => println!("(no output)"),
        Err(e) => eprintln!("error: {e}"),
    }
}
