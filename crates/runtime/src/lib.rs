//! Trellis runtime: structures of tasks over a prompt driver.
//!
//! A [`Structure`] owns a graph of [`Task`]s, the [`model::Driver`] they
//! prompt through, an [`EventBus`], rulesets and conversation memory.
//! Agents hold one task, pipelines chain tasks in order, workflows run an
//! explicit graph where a [`ControlFlowTask`] may pick which children run.
//! [`Stream`] bridges a streaming run into text fragments.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_runtime::{PromptTask, Structure};
//!
//! let mut pipeline = Structure::pipeline(driver);
//! pipeline.add_task(PromptTask::new("Name a color. {{ args[0] }}"))?;
//! pipeline.add_task(PromptTask::new("Write a haiku about {{ parent_output }}"))?;
//! let output = pipeline.run(["be bold"]).await?;
//! ```

pub use artifact::{
    Artifact, ErrorArtifact, ImageArtifact, ListArtifact, TaskArtifact, TaskRef, TextArtifact,
    TextChunk,
};
pub use chunker::TextChunker;
pub use config::{DEFAULT_STREAM_CAPACITY, MemoryConfig, StreamConfig, StructureConfig};
pub use engine::SummaryEngine;
pub use error::{Error, Result};
pub use event::{Callback, Event, EventBus, EventKind, EventListener, ListenerId};
pub use memory::{ConversationMemory, Run};
pub use rules::{Rule, Ruleset};
pub use stream::Stream;
pub use structure::{Structure, StructureKind};
pub use task::{
    Branch, Context, ControlFlowTask, DEFAULT_INPUT_TEMPLATE, Handler, Input, Outcome,
    PromptTask, Selection, Task, TaskId, TaskState, TaskView, TextSummaryTask, Tool, ToolkitTask,
    new_task_id,
};

mod artifact;
mod chunker;
mod config;
mod engine;
mod error;
mod event;
mod memory;
pub mod prompt;
pub mod rules;
mod stream;
mod structure;
pub mod task;
