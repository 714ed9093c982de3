//! Relocator and flagger.
//!
//! The two steps fail independently. Neither undoes the other, so a
//! message can end up moved but still unseen until the next cycle flags it.

use mailprint_imap::{Flag, SequenceSet};

use crate::session::ensure_connected;
use crate::store::MailStore;
use crate::Result;

/// Moves `set` from `source` to `destination`.
///
/// # Errors
///
/// Returns an error if the session cannot be re-established, the source
/// cannot be opened read-write, or the server rejects the move.
pub async fn relocate<S: MailStore>(
    store: &mut S,
    source: &str,
    set: &SequenceSet,
    destination: &str,
) -> Result<()> {
    ensure_connected(store).await?;

    tracing::debug!(count = set.len(), source, destination, "Moving messages");
    store.select(source).await?;
    store.move_messages(set, destination).await?;

    tracing::info!(count = set.len(), destination, "Moved printed messages");
    Ok(())
}

/// Marks every unseen message in `mailbox` as seen. Returns how many were
/// flagged.
///
/// # Errors
///
/// Returns an error if the session cannot be re-established, the folder
/// cannot be opened, or the search or store fails.
pub async fn mark_seen<S: MailStore>(store: &mut S, mailbox: &str) -> Result<usize> {
    ensure_connected(store).await?;

    tracing::debug!(mailbox, "Marking messages read");
    store.select(mailbox).await?;
    let unseen: SequenceSet = store.search_unseen().await?.into_iter().collect();
    if unseen.is_empty() {
        tracing::debug!(mailbox, "No unread messages found");
        return Ok(0);
    }

    store.add_flags(&unseen, &[Flag::Seen]).await?;
    tracing::debug!(mailbox, count = unseen.len(), "Marked messages read");
    Ok(unseen.len())
}
