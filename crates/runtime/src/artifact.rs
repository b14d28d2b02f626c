//! Task outputs.

use crate::{Error, Result, Task, TaskId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, sync::Arc};
use tcore::Image;

/// Separator used when rendering a list as text.
const LIST_SEPARATOR: &str = "\n\n";

/// The value produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// Plain text.
    Text(TextArtifact),
    /// A failure, carrying its message.
    Error(ErrorArtifact),
    /// An ordered list of artifacts.
    List(ListArtifact),
    /// A reference to a task, produced by control flow.
    Task(TaskArtifact),
    /// An image.
    Image(ImageArtifact),
}

impl Artifact {
    /// A text artifact.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(TextArtifact {
            value: value.into(),
        })
    }

    /// An error artifact.
    pub fn error(value: impl Into<String>) -> Self {
        Self::Error(ErrorArtifact {
            value: value.into(),
        })
    }

    /// A list artifact.
    pub fn list(value: Vec<Artifact>) -> Self {
        Self::List(ListArtifact { value })
    }

    /// The variant name, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "TextArtifact",
            Self::Error(_) => "ErrorArtifact",
            Self::List(_) => "ListArtifact",
            Self::Task(_) => "TaskArtifact",
            Self::Image(_) => "ImageArtifact",
        }
    }

    /// Whether this is an error artifact.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Render as text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(a) => a.value.clone(),
            Self::Error(a) => a.value.clone(),
            Self::List(a) => a
                .value
                .iter()
                .map(Artifact::to_text)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
            Self::Task(a) => a.task_id().to_string(),
            Self::Image(a) => format!(
                "Image, format: {}, size: {} bytes",
                a.image.format,
                a.image.bytes.len()
            ),
        }
    }

    /// Concatenate two artifacts.
    ///
    /// Text joins text, lists extend with lists and append anything else.
    /// Task references never concatenate.
    pub fn concat(&self, other: &Artifact) -> Result<Artifact> {
        match (self, other) {
            (Self::Task(_), _) | (_, Self::Task(_)) => {
                Err(Error::UnsupportedConcat(self.kind(), other.kind()))
            }
            (Self::Text(a), Self::Text(b)) => Ok(Self::text(format!("{}{}", a.value, b.value))),
            (Self::List(a), Self::List(b)) => {
                let mut value = a.value.clone();
                value.extend(b.value.iter().cloned());
                Ok(Self::list(value))
            }
            (Self::List(a), item) => {
                let mut value = a.value.clone();
                value.push(item.clone());
                Ok(Self::list(value))
            }
            _ => Err(Error::UnsupportedConcat(self.kind(), other.kind())),
        }
    }
}

/// Plain text output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextArtifact {
    /// The text.
    pub value: String,
}

/// A failure rendered as an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorArtifact {
    /// The failure message.
    pub value: String,
}

/// An ordered list of artifacts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListArtifact {
    /// The items.
    pub value: Vec<Artifact>,
}

/// An image output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// The image.
    pub image: Image,
}

/// A task reference produced by control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArtifact {
    /// The referenced task.
    pub target: TaskRef,
}

impl TaskArtifact {
    /// Reference a task.
    pub fn new(target: impl Into<TaskRef>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The referenced task id.
    pub fn task_id(&self) -> &TaskId {
        self.target.task_id()
    }

    /// The live task, if this artifact holds one.
    pub fn task(&self) -> Option<&Arc<dyn Task>> {
        self.target.task()
    }
}

impl From<TaskArtifact> for Artifact {
    fn from(value: TaskArtifact) -> Self {
        Self::Task(value)
    }
}

/// A task, either by id or as a live reference.
///
/// Equality compares task ids only, so both forms of the same task are
/// equal. Serializes as the id.
#[derive(Clone)]
pub enum TaskRef {
    /// A task id, resolved against the structure.
    Id(TaskId),
    /// A live task.
    Task(Arc<dyn Task>),
}

impl TaskRef {
    /// The task id of either form.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Id(id) => id,
            Self::Task(task) => task.id(),
        }
    }

    /// The live task, if present.
    pub fn task(&self) -> Option<&Arc<dyn Task>> {
        match self {
            Self::Id(_) => None,
            Self::Task(task) => Some(task),
        }
    }
}

impl PartialEq for TaskRef {
    fn eq(&self, other: &Self) -> bool {
        self.task_id() == other.task_id()
    }
}

impl Eq for TaskRef {}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Task(task) => f
                .debug_struct("Task")
                .field("id", task.id())
                .field("kind", &task.kind())
                .finish(),
        }
    }
}

impl From<&str> for TaskRef {
    fn from(value: &str) -> Self {
        Self::Id(value.into())
    }
}

impl From<String> for TaskRef {
    fn from(value: String) -> Self {
        Self::Id(value.into())
    }
}

impl From<TaskId> for TaskRef {
    fn from(value: TaskId) -> Self {
        Self::Id(value)
    }
}

impl From<&TaskId> for TaskRef {
    fn from(value: &TaskId) -> Self {
        Self::Id(value.clone())
    }
}

impl From<Arc<dyn Task>> for TaskRef {
    fn from(value: Arc<dyn Task>) -> Self {
        Self::Task(value)
    }
}

impl Serialize for TaskRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.task_id().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        TaskId::deserialize(deserializer).map(Self::Id)
    }
}

/// A fragment of streamed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The fragment.
    pub value: String,
}

impl TextChunk {
    /// Create a chunk.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl fmt::Display for TextChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
