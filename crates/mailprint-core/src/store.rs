//! The mail store seam.
//!
//! Pipeline stages only talk to the mail store through [`MailStore`], which
//! [`Session`] implements against a live server. Tests drive the same stages
//! with an in-memory store.

use std::future::Future;
use std::pin::pin;

use futures::TryStreamExt;
use mailprint_imap::{Flag, SeqNum, SequenceSet, Session, SessionState};
use tokio::sync::mpsc;

/// Fetch item for full message bodies. `PEEK` keeps `\Seen` untouched.
pub const BODY_QUERY: &str = "BODY.PEEK[]";

/// One fetched message on its way through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Sequence number in the source folder.
    pub seq: SeqNum,
    /// Raw RFC 5322 body literals as delivered by the server.
    pub literals: Vec<Vec<u8>>,
}

/// Operations the pipeline needs from a mail store session.
///
/// Sequence numbers are relative to the folder opened last, so callers
/// open the folder they mean before every search, fetch, move or store.
pub trait MailStore: Send + 'static {
    /// Returns the current session state.
    fn state(&self) -> SessionState;

    /// Runs a fresh connect and login.
    fn reconnect(&mut self) -> impl Future<Output = mailprint_imap::Result<()>> + Send;

    /// Opens `mailbox` read-only.
    fn examine(&mut self, mailbox: &str)
    -> impl Future<Output = mailprint_imap::Result<u32>> + Send;

    /// Opens `mailbox` read-write.
    fn select(&mut self, mailbox: &str) -> impl Future<Output = mailprint_imap::Result<u32>> + Send;

    /// Searches the open folder for messages without `\Seen`.
    fn search_unseen(&mut self)
    -> impl Future<Output = mailprint_imap::Result<Vec<SeqNum>>> + Send;

    /// Fetches every message in `set` and pushes one envelope per message
    /// onto `queue`. Returns how many envelopes were delivered.
    ///
    /// If the receiving side goes away the remaining responses are still
    /// read, so the session stays usable.
    fn fetch_bodies(
        &mut self,
        set: &SequenceSet,
        queue: &mpsc::Sender<MessageEnvelope>,
    ) -> impl Future<Output = mailprint_imap::Result<usize>> + Send;

    /// Moves `set` from the open folder to `mailbox`.
    fn move_messages(
        &mut self,
        set: &SequenceSet,
        mailbox: &str,
    ) -> impl Future<Output = mailprint_imap::Result<()>> + Send;

    /// Adds `flags` to every message in `set` in the open folder.
    fn add_flags(
        &mut self,
        set: &SequenceSet,
        flags: &[Flag],
    ) -> impl Future<Output = mailprint_imap::Result<()>> + Send;

    /// Logs out.
    fn logout(&mut self) -> impl Future<Output = mailprint_imap::Result<()>> + Send;
}

impl MailStore for Session {
    fn state(&self) -> SessionState {
        Self::state(self)
    }

    async fn reconnect(&mut self) -> mailprint_imap::Result<()> {
        Self::reconnect(self).await
    }

    async fn examine(&mut self, mailbox: &str) -> mailprint_imap::Result<u32> {
        Self::examine(self, mailbox).await
    }

    async fn select(&mut self, mailbox: &str) -> mailprint_imap::Result<u32> {
        Self::select(self, mailbox).await
    }

    async fn search_unseen(&mut self) -> mailprint_imap::Result<Vec<SeqNum>> {
        Self::search_unseen(self).await
    }

    async fn fetch_bodies(
        &mut self,
        set: &SequenceSet,
        queue: &mpsc::Sender<MessageEnvelope>,
    ) -> mailprint_imap::Result<usize> {
        let outcome = stream_bodies(self, set, queue).await;
        self.settle(outcome)
    }

    async fn move_messages(&mut self, set: &SequenceSet, mailbox: &str) -> mailprint_imap::Result<()> {
        self.mv(set, mailbox).await
    }

    async fn add_flags(&mut self, set: &SequenceSet, flags: &[Flag]) -> mailprint_imap::Result<()> {
        Self::add_flags(self, set, flags).await
    }

    async fn logout(&mut self) -> mailprint_imap::Result<()> {
        Self::logout(self).await
    }
}

async fn stream_bodies(
    session: &mut Session,
    set: &SequenceSet,
    queue: &mpsc::Sender<MessageEnvelope>,
) -> mailprint_imap::Result<usize> {
    let mut fetches = pin!(session.fetch(set, BODY_QUERY).await?);
    let mut delivered = 0;
    let mut consumer_gone = false;

    while let Some(fetch) = fetches.try_next().await? {
        let Some(seq) = SeqNum::new(fetch.message) else {
            continue;
        };
        let literals = fetch.body().map(|body| vec![body.to_vec()]).unwrap_or_default();
        drop(fetch);

        if consumer_gone {
            continue;
        }
        if queue.send(MessageEnvelope { seq, literals }).await.is_err() {
            tracing::debug!("Envelope queue closed, draining remaining responses");
            consumer_gone = true;
        } else {
            delivered += 1;
        }
    }

    Ok(delivered)
}
