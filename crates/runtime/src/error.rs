//! Runtime error type.

use crate::TaskId;

/// Structural and configuration errors raised by the runtime.
///
/// Failures inside a task never surface here; they become the task's
/// error artifact.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No task with this id is registered.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// A task with this id is already registered.
    #[error("task {0} already exists")]
    DuplicateTask(TaskId),

    /// The link would close a cycle.
    #[error("linking {parent} -> {child} would create a cycle")]
    Cycle {
        /// The would-be parent.
        parent: TaskId,
        /// The would-be child.
        child: TaskId,
    },

    /// A control-flow task selected a task that is not its child.
    #[error("ControlFlowTask {0} did not return a valid child task")]
    InvalidSelection(TaskId),

    /// A control-flow task selected nothing.
    #[error("ControlFlowTask {0} did not return any tasks")]
    EmptySelection(TaskId),

    /// Streaming was requested over a driver that does not stream.
    #[error("prompt driver does not have streaming enabled, enable it with stream = true")]
    StreamingDisabled,

    /// The configuration is unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configuration text is not valid TOML for this schema.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Reading configuration failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// These artifacts cannot be concatenated.
    #[error("cannot concatenate {0} with {1}")]
    UnsupportedConcat(&'static str, &'static str),

    /// The stream's structure is already running or was lost.
    #[error("stream has no structure to run")]
    StreamBusy,

    /// The structure worker panicked or was cancelled.
    #[error("structure worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runtime result alias.
pub type Result<T> = std::result::Result<T, Error>;
