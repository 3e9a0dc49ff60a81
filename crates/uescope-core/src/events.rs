//! Progress events published by the parsers.
//!
//! Producers emit at most one event per chunk boundary; consumers subscribe
//! and may coalesce. The bus fans a single producer out to any number of
//! receivers and silently drops channels whose receiver has gone away.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use serde::Serialize;

/// Progress of the NamePool block walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamePoolProgress {
    pub current_chunk: u32,
    pub total_chunks: u32,
    pub current_names: u32,
    pub total_names: u32,
}

/// Progress of the GUObjectArray chunk walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectArrayProgress {
    pub current_chunk: u32,
    pub total_chunks: u32,
    pub current_objects: u32,
    pub total_objects: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    NamePool(NamePoolProgress),
    ObjectArray(ObjectArrayProgress),
    ProcessSelected { process_name: String, pid: u32 },
}

impl ProgressEvent {
    /// Channel name the event is published under.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::NamePool(_) => "fname-pool-progress",
            Self::ObjectArray(_) => "guobject-array-progress",
            Self::ProcessSelected { .. } => "process-selected",
        }
    }
}

/// Single-producer multi-consumer event bus.
#[derive(Default)]
pub struct EventBus {
    senders: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer. Events emitted after this call are delivered
    /// to the returned receiver.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = channel();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: ProgressEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
