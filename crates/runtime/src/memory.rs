//! Conversation memory: the runs of a structure, replayed into prompts.

use serde::{Deserialize, Serialize};
use tcore::{Message, PromptStack, Tokenizer};

/// One structure run as remembered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Run id, a lowercase ULID.
    pub id: String,
    /// What the user asked.
    pub input: String,
    /// What the structure answered.
    pub output: String,
}

impl Run {
    /// Record a run with a fresh id.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Past runs of a structure, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    runs: Vec<Run>,
    /// Keep at most this many runs, evicting the oldest.
    pub max_runs: Option<usize>,
    /// Drop old runs from prompts that would overflow the context window.
    pub autoprune: bool,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            max_runs: None,
            autoprune: true,
        }
    }
}

impl ConversationMemory {
    /// An empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of remembered runs.
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Toggle autopruning.
    pub fn with_autoprune(mut self, autoprune: bool) -> Self {
        self.autoprune = autoprune;
        self
    }

    /// Remember a run.
    pub fn add_run(&mut self, run: Run) {
        self.runs.push(run);
        if let Some(max) = self.max_runs {
            let excess = self.runs.len().saturating_sub(max);
            self.runs.drain(..excess);
        }
    }

    /// Remembered runs, oldest first.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// The most recent `last` runs as user/assistant message pairs.
    pub fn to_messages(&self, last: usize) -> Vec<Message> {
        let skip = self.runs.len().saturating_sub(last);
        self.runs[skip..]
            .iter()
            .flat_map(|run| [Message::user(&run.input), Message::assistant(&run.output)])
            .collect()
    }

    /// Insert remembered runs into `stack` at `index`.
    ///
    /// With autopruning on, the oldest runs are left out until the stack
    /// leaves room in the tokenizer's input budget.
    pub fn add_to_stack(&self, stack: &mut PromptStack, tokenizer: &Tokenizer, index: usize) {
        let mut fit = self.runs.len();
        if self.autoprune {
            while fit > 0 {
                let mut candidate = stack.clone();
                candidate.messages.splice(index..index, self.to_messages(fit));
                if tokenizer.count_input_tokens_left(&candidate.text()) > 0 {
                    break;
                }
                fit -= 1;
            }
            if fit < self.runs.len() {
                tracing::debug!("pruned {} runs from the prompt", self.runs.len() - fit);
            }
        }

        stack.messages.splice(index..index, self.to_messages(fit));
    }
}
