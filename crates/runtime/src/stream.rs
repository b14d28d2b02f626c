//! Bridging a structure run into a stream of text fragments.

use crate::{
    Error, Event, EventKind, EventListener, Result, Structure, TextChunk,
    config::DEFAULT_STREAM_CAPACITY,
};
use async_stream::try_stream;
use futures_core::Stream as FuturesStream;
use tokio::sync::mpsc;

/// Runs a streaming structure on a worker task and yields its output as
/// it is generated.
///
/// Yields token text, a newline when a prompt finishes, and a header line
/// when the model starts calling a tool. Events flow through a bounded
/// channel, so a slow consumer slows the producer down.
#[derive(Debug)]
pub struct Stream {
    structure: Option<Structure>,
    capacity: usize,
}

impl Stream {
    /// Wrap a structure whose driver streams.
    pub fn new(structure: Structure) -> Result<Self> {
        Self::with_capacity(structure, DEFAULT_STREAM_CAPACITY)
    }

    /// Wrap a structure, buffering at most `capacity` events.
    pub fn with_capacity(structure: Structure, capacity: usize) -> Result<Self> {
        if !structure.driver().stream() {
            return Err(Error::StreamingDisabled);
        }
        Ok(Self {
            structure: Some(structure),
            capacity: capacity.max(1),
        })
    }

    /// The structure, unless a run was abandoned midway.
    pub fn structure(&self) -> Option<&Structure> {
        self.structure.as_ref()
    }

    /// Take the structure back.
    pub fn into_inner(self) -> Option<Structure> {
        self.structure
    }

    /// Run the structure, yielding fragments until it finishes.
    ///
    /// The structure is back in place once the stream ends. Dropping the
    /// stream early lets the run finish in the background without it.
    pub fn run<S: Into<String>>(
        &mut self,
        args: impl IntoIterator<Item = S>,
    ) -> impl FuturesStream<Item = Result<TextChunk>> + Send + '_ {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let capacity = self.capacity;

        try_stream! {
            let mut structure = self.structure.take().ok_or(Error::StreamBusy)?;
            let (tx, mut rx) = mpsc::channel(capacity);
            let listener = EventListener::channel(tx).kinds([
                EventKind::CompletionChunk,
                EventKind::ActionChunk,
                EventKind::FinishPrompt,
                EventKind::FinishStructureRun,
            ]);
            let id = structure.add_event_listener(listener);

            let worker = tokio::spawn(async move {
                let result = structure.run(args).await;
                structure.remove_event_listener(id);
                (structure, result)
            });

            while let Some(event) = rx.recv().await {
                match event {
                    Event::CompletionChunk { token } => yield TextChunk::new(token),
                    Event::FinishPrompt { .. } => yield TextChunk::new("\n"),
                    Event::ActionChunk { tag, name, path, partial_input, .. } => {
                        if let Some(name) = name {
                            let path = path.unwrap_or_default();
                            let tag = tag.unwrap_or_default();
                            yield TextChunk::new(format!("\n{name}.{path} ({tag})"));
                        } else if let Some(input) = partial_input {
                            yield TextChunk::new(input);
                        }
                    }
                    Event::FinishStructureRun { .. } => break,
                    _ => {}
                }
            }

            let (structure, result) = worker.await?;
            self.structure = Some(structure);
            result?;
        }
    }
}
