//! Bulk fetcher.
//!
//! The fetch runs on its own task so decoding and writing artifacts can
//! start while the rest of the bodies are still arriving. The task owns the
//! store for the duration and hands it back through a single-slot
//! completion channel together with the fetch outcome.
//!
//! ```text
//! spawn(store, set) ──→ [task] fetch_bodies ──→ mpsc(10) ──→ next()
//!                              │
//!                              └──→ oneshot(store, outcome) ──→ finish()
//! ```

use mailprint_imap::SequenceSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::store::{MailStore, MessageEnvelope};
use crate::{Error, Result};

/// Envelopes buffered between the fetch task and the consumer.
pub const FETCH_QUEUE_CAPACITY: usize = 10;

struct Completion<S> {
    store: S,
    outcome: mailprint_imap::Result<usize>,
}

/// Consumer side of a running fetch.
pub struct FetchHandle<S> {
    queue: mpsc::Receiver<MessageEnvelope>,
    completion: oneshot::Receiver<Completion<S>>,
    task: JoinHandle<()>,
}

/// Starts fetching every message in `set` on a background task.
pub fn spawn<S: MailStore>(mut store: S, set: SequenceSet) -> FetchHandle<S> {
    let (queue_tx, queue) = mpsc::channel(FETCH_QUEUE_CAPACITY);
    let (done_tx, completion) = oneshot::channel();

    let task = tokio::spawn(async move {
        tracing::debug!(count = set.len(), %set, "Fetching messages");
        let outcome = store.fetch_bodies(&set, &queue_tx).await;
        drop(queue_tx);

        if done_tx.send(Completion { store, outcome }).is_err() {
            tracing::debug!("Fetch handle dropped before completion");
        }
    });

    FetchHandle {
        queue,
        completion,
        task,
    }
}

impl<S> FetchHandle<S> {
    /// Waits for the next envelope. Returns `None` once the fetch has
    /// delivered everything.
    pub async fn next(&mut self) -> Option<MessageEnvelope> {
        self.queue.recv().await
    }

    /// Waits for the fetch task and takes the store back.
    ///
    /// Envelopes not yet taken with [`next`](Self::next) are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchTask`] if the task died without handing the
    /// store back. The fetch's own outcome is returned alongside the store.
    pub async fn finish(self) -> Result<(S, mailprint_imap::Result<usize>)> {
        let Self {
            queue,
            completion,
            task,
        } = self;
        drop(queue);

        match completion.await {
            Ok(Completion { store, outcome }) => Ok((store, outcome)),
            Err(_) => match task.await {
                Err(join) => Err(Error::FetchTask(join.to_string())),
                Ok(()) => Err(Error::FetchTask("completion slot dropped".into())),
            },
        }
    }
}

impl<S> std::fmt::Debug for FetchHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}
