//! Actor-isolated record store.
//!
//! Every access goes through one mailbox drained by one task, so concurrent
//! callers never race on the records. Replies come back over bridge
//! continuations: an actor that stops mid-request resolves its callers with
//! [`ActorError::Stopped`] instead of parking them.
//!
//! Handles are explicit and cheap to clone. The actor exits once every handle
//! has been dropped.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use tether_bridge::{Continuation, pending};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ActorError;

enum Command {
    PushRandom(Continuation<String, Infallible>),
    Snapshot(Continuation<Vec<String>, Infallible>),
    Len(Continuation<usize, Infallible>),
}

#[derive(Clone)]
pub struct RecordStore {
    label: Arc<str>,
    mailbox: mpsc::Sender<Command>,
}

impl RecordStore {
    /// Start the actor task. Must be called within a Tokio runtime.
    pub fn spawn(label: impl Into<Arc<str>>, capacity: usize) -> Self {
        let label = label.into();
        let (mailbox, inbox) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(Arc::clone(&label), inbox));
        Self { label, mailbox }
    }

    /// Not isolated: immutable after construction, so no mailbox round trip.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append a fresh record and return a randomly chosen one.
    pub async fn push_random(&self) -> Result<String, ActorError> {
        self.request(Command::PushRandom).await
    }

    pub async fn snapshot(&self) -> Result<Vec<String>, ActorError> {
        self.request(Command::Snapshot).await
    }

    pub async fn len(&self) -> Result<usize, ActorError> {
        self.request(Command::Len).await
    }

    pub async fn is_empty(&self) -> Result<bool, ActorError> {
        Ok(self.len().await? == 0)
    }

    async fn request<T, F>(&self, command: F) -> Result<T, ActorError>
    where
        F: FnOnce(Continuation<T, Infallible>) -> Command,
    {
        if self.mailbox.is_closed() {
            return Err(ActorError::Stopped);
        }
        let (continuation, reply) = pending();
        self.mailbox
            .send(command(continuation))
            .await
            .map_err(|_| ActorError::Stopped)?;
        reply.await.map_err(|_| ActorError::Stopped)
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("label", &self.label)
            .field("stopped", &self.mailbox.is_closed())
            .finish()
    }
}

async fn run(label: Arc<str>, mut inbox: mpsc::Receiver<Command>) {
    let mut records: Vec<String> = Vec::new();
    tracing::debug!(store = %label, "record store started");

    while let Some(command) = inbox.recv().await {
        match command {
            Command::PushRandom(reply) => {
                records.push(Uuid::new_v4().to_string());
                let pick = records[rand::random_range(0..records.len())].clone();
                reply.resume_returning(pick);
            }
            Command::Snapshot(reply) => reply.resume_returning(records.clone()),
            Command::Len(reply) => reply.resume_returning(records.len()),
        }
    }

    tracing::debug!(store = %label, records = records.len(), "record store stopped");
}
