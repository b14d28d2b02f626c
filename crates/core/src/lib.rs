//! Core types for the Trellis LLM framework.
//!
//! This crate holds the vendor-neutral prompt model shared by every
//! driver and by the runtime: role-tagged [`Message`]s collected into a
//! [`PromptStack`], streaming [`DeltaMessage`]s and the [`MessageBuilder`]
//! that folds them back together, [`ToolSpec`] definitions, and the
//! [`Tokenizer`] budget estimates. Nothing here performs I/O.

pub use message::{
    ActionCall, ActionResult, Content, DeltaContent, DeltaMessage, Image, Message,
    MessageBuilder, PromptStack, Role, Usage,
};
pub use tokenizer::{Tokenizer, default_context_limit};
pub use tool::ToolSpec;
pub use utils::expand_env_vars;

mod message;
mod tokenizer;
mod tool;
mod utils;
