//! Token budget estimates.

/// Characters per token used by the estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Default number of tokens reserved for a completion.
const DEFAULT_MAX_OUTPUT_TOKENS: usize = 4_096;

/// Estimates token counts against a model's context window.
///
/// The estimate is vendor-neutral, roughly four characters per token,
/// rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    /// Context window of the model.
    pub max_input_tokens: usize,
    /// Completion budget of the model.
    pub max_output_tokens: usize,
}

impl Tokenizer {
    /// Create a tokenizer with explicit limits.
    pub fn new(max_input_tokens: usize, max_output_tokens: usize) -> Self {
        Self {
            max_input_tokens,
            max_output_tokens,
        }
    }

    /// Tokenizer sized for a known model id.
    pub fn for_model(model: &str) -> Self {
        let max_input_tokens = default_context_limit(model);
        Self {
            max_input_tokens,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS.min(max_input_tokens),
        }
    }

    /// Estimated token count of `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    /// Input tokens left after `text`, saturating at zero.
    pub fn count_input_tokens_left(&self, text: &str) -> usize {
        self.max_input_tokens.saturating_sub(self.count_tokens(text))
    }

    /// Output tokens left after `text`, saturating at zero.
    pub fn count_output_tokens_left(&self, text: &str) -> usize {
        self.max_output_tokens.saturating_sub(self.count_tokens(text))
    }
}

/// Returns the default context limit (in tokens) for a known model ID.
///
/// Uses prefix matching against known model families. Unknown models
/// return 8192 as a conservative default.
pub fn default_context_limit(model_id: &str) -> usize {
    const TABLE: &[(&str, usize)] = &[
        ("gpt-4o", 128_000),
        ("gpt-4-turbo", 128_000),
        ("gpt-4-32k", 32_768),
        ("gpt-4", 8_192),
        ("gpt-3.5-turbo-16k", 16_385),
        ("gpt-3.5", 16_385),
        ("o1", 200_000),
        ("o3", 200_000),
        ("o4", 200_000),
        ("anthropic.claude-3", 200_000),
        ("anthropic.claude", 100_000),
        ("claude-", 200_000),
        ("amazon.titan-text-express", 8_192),
        ("amazon.titan-text-lite", 4_096),
        ("meta.llama3", 8_192),
        ("meta.llama2", 4_096),
        ("mistral.", 32_768),
        ("cohere.command-r", 128_000),
        ("cohere.command", 4_096),
        ("HuggingFaceH4/zephyr", 4_096),
        ("deepseek-", 64_000),
    ];

    TABLE
        .iter()
        .find(|(prefix, _)| model_id.starts_with(prefix))
        .map(|(_, limit)| *limit)
        .unwrap_or(8_192)
}
