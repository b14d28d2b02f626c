//! Summarizing text that may not fit the model's context window.

use crate::{Artifact, Error, EventBus, Ruleset, TextChunker, prompt, rules};
use model::Driver;
use tcore::PromptStack;

const SUMMARY_TEMPLATE: &str = r#"{% if summary %}Summary so far:
{{ summary }}

Extend the summary with the text below.{% else %}Summarize the text below.{% endif %} Keep every key fact and be concise.

Text:
"""
{{ text }}
"""
{% if rulesets %}
{{ rulesets }}
{% endif %}
Summary:"#;

/// Summarizes text through a prompt driver, chunk by chunk when needed.
#[derive(Debug, Clone)]
pub struct SummaryEngine {
    driver: Driver,
    chunk_joiner: String,
    max_token_multiplier: f64,
}

impl SummaryEngine {
    /// Engine with the default joiner and a multiplier of 0.5.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            chunk_joiner: "\n\n".into(),
            max_token_multiplier: 0.5,
        }
    }

    /// Share of the input budget a chunk may use, in `(0, 1]`.
    pub fn with_max_token_multiplier(mut self, multiplier: f64) -> crate::Result<Self> {
        if multiplier > 1.0 {
            return Err(Error::InvalidConfig(
                "max_token_multiplier has to be less than or equal to 1".into(),
            ));
        }
        if multiplier <= 0.0 || multiplier.is_nan() {
            return Err(Error::InvalidConfig(
                "max_token_multiplier has to be greater than 0".into(),
            ));
        }
        self.max_token_multiplier = multiplier;
        Ok(self)
    }

    /// Separator between summarized artifacts.
    pub fn with_chunk_joiner(mut self, joiner: impl Into<String>) -> Self {
        self.chunk_joiner = joiner.into();
        self
    }

    /// Token budget of each chunk.
    pub fn max_chunker_tokens(&self) -> usize {
        let max = self.driver.tokenizer().max_input_tokens as f64;
        (max * self.max_token_multiplier).round() as usize
    }

    /// Tokens that must stay free for the summary itself.
    pub fn min_response_tokens(&self) -> usize {
        let max = self.driver.tokenizer().max_input_tokens as f64;
        (max - max * self.max_token_multiplier).round() as usize
    }

    /// The chunker sized for this engine.
    pub fn chunker(&self) -> TextChunker {
        TextChunker::new(self.driver.tokenizer(), self.max_chunker_tokens())
    }

    /// Summarize one text.
    pub async fn summarize_text(
        &self,
        text: &str,
        rulesets: &[Ruleset],
        events: &EventBus,
    ) -> anyhow::Result<Artifact> {
        self.summarize(vec![text.to_owned()], rulesets, events).await
    }

    /// Summarize artifacts as one text.
    pub async fn summarize_artifacts(
        &self,
        artifacts: &[Artifact],
        rulesets: &[Ruleset],
        events: &EventBus,
    ) -> anyhow::Result<Artifact> {
        let texts = artifacts.iter().map(Artifact::to_text).collect();
        self.summarize(texts, rulesets, events).await
    }

    async fn summarize(
        &self,
        mut texts: Vec<String>,
        rulesets: &[Ruleset],
        events: &EventBus,
    ) -> anyhow::Result<Artifact> {
        let tokenizer = self.driver.tokenizer();
        let rules = rules::render(rulesets);
        let chunker = self.chunker();
        let mut summary: Option<String> = None;

        loop {
            let text = texts.join(&self.chunk_joiner);
            let full = render(summary.as_deref(), &text, &rules)?;
            let chunks = chunker.chunk(&text);
            if tokenizer.count_input_tokens_left(&full) >= self.min_response_tokens()
                || chunks.is_empty()
            {
                let message = self.prompt(full, events).await?;
                return Ok(Artifact::text(message));
            }

            tracing::debug!("summarizing {} chunks", chunks.len());
            let partial = render(summary.as_deref(), &chunks[0].value, &rules)?;
            summary = Some(self.prompt(partial, events).await?);
            texts = chunks.into_iter().skip(1).map(|c| c.value).collect();
        }
    }

    async fn prompt(&self, text: String, events: &EventBus) -> anyhow::Result<String> {
        let mut stack = PromptStack::new();
        stack.add_user(text);
        Ok(prompt::run(&self.driver, events, &stack).await?.text())
    }
}

fn render(summary: Option<&str>, text: &str, rulesets: &str) -> anyhow::Result<String> {
    let env = minijinja::Environment::new();
    Ok(env.render_str(
        SUMMARY_TEMPLATE,
        minijinja::context! { summary, text, rulesets },
    )?)
}
