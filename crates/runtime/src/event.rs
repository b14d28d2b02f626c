//! Structure events and their listeners.

use crate::TaskId;
use compact_str::CompactString;
use serde::Serialize;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tcore::Usage;
use tokio::sync::mpsc;

/// Something that happened during a structure run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run started with these arguments.
    StartStructureRun {
        /// Run arguments.
        args: Vec<String>,
    },
    /// A run finished.
    FinishStructureRun {
        /// Structure output text, if any.
        output: Option<String>,
    },
    /// A task started executing.
    StartTask {
        /// The task.
        task_id: TaskId,
        /// The task kind.
        kind: &'static str,
    },
    /// A task finished.
    FinishTask {
        /// The task.
        task_id: TaskId,
        /// Output text.
        output: String,
        /// Whether the output is an error.
        error: bool,
    },
    /// A prompt is about to be sent.
    StartPrompt {
        /// The model.
        model: String,
        /// Estimated prompt tokens.
        token_count: usize,
    },
    /// A prompt reply was received.
    FinishPrompt {
        /// The model.
        model: String,
        /// Reported usage.
        usage: Usage,
        /// Reply text.
        result: String,
    },
    /// A streamed text fragment.
    CompletionChunk {
        /// The fragment.
        token: String,
    },
    /// A streamed tool invocation fragment.
    ActionChunk {
        /// Content block index.
        index: u32,
        /// Vendor call id.
        tag: Option<CompactString>,
        /// Tool name.
        name: Option<CompactString>,
        /// Tool activity.
        path: Option<CompactString>,
        /// Input fragment.
        partial_input: Option<String>,
    },
}

/// The variant of an [`Event`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartStructureRun,
    FinishStructureRun,
    StartTask,
    FinishTask,
    StartPrompt,
    FinishPrompt,
    CompletionChunk,
    ActionChunk,
}

impl Event {
    /// The variant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StartStructureRun { .. } => EventKind::StartStructureRun,
            Self::FinishStructureRun { .. } => EventKind::FinishStructureRun,
            Self::StartTask { .. } => EventKind::StartTask,
            Self::FinishTask { .. } => EventKind::FinishTask,
            Self::StartPrompt { .. } => EventKind::StartPrompt,
            Self::FinishPrompt { .. } => EventKind::FinishPrompt,
            Self::CompletionChunk { .. } => EventKind::CompletionChunk,
            Self::ActionChunk { .. } => EventKind::ActionChunk,
        }
    }
}

/// A callback receiving events synchronously.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

enum Sink {
    Callback(Callback),
    Channel {
        tx: mpsc::Sender<Event>,
        closed: AtomicBool,
    },
}

/// Receives events of the kinds it subscribed to.
pub struct EventListener {
    sink: Sink,
    kinds: Option<Vec<EventKind>>,
}

impl EventListener {
    /// A listener calling `f` for every event.
    pub fn callback(f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        Self {
            sink: Sink::Callback(Arc::new(f)),
            kinds: None,
        }
    }

    /// A listener forwarding events into a channel.
    ///
    /// Sends are awaited, so a bounded channel slows the run down to the
    /// pace of its receiver. Once the receiver is gone, events are dropped.
    pub fn channel(tx: mpsc::Sender<Event>) -> Self {
        Self {
            sink: Sink::Channel {
                tx,
                closed: AtomicBool::new(false),
            },
            kinds: None,
        }
    }

    /// Only receive these kinds of events.
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Whether this listener wants events of `kind`.
    pub fn accepts(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    async fn publish(&self, event: &Event) {
        match &self.sink {
            Sink::Callback(f) => f(event),
            Sink::Channel { tx, closed } => {
                if closed.load(Ordering::Relaxed) {
                    return;
                }
                if tx.send(event.clone()).await.is_err() && !closed.swap(true, Ordering::Relaxed) {
                    tracing::warn!("event listener channel closed, dropping further events");
                }
            }
        }
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Callback(_) => "callback",
            Sink::Channel { .. } => "channel",
        };
        f.debug_struct("EventListener")
            .field("sink", &sink)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// The listeners of one structure, in registration order.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, EventListener)>,
    next: u64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add(&mut self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a listener, returning whether it was registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every interested listener, in order.
    pub async fn publish(&self, event: Event) {
        tracing::trace!("event: {event:?}");
        let kind = event.kind();
        for (_, listener) in &self.listeners {
            if listener.accepts(kind) {
                listener.publish(&event).await;
            }
        }
    }
}
