//! Unread locator.

use mailprint_imap::SeqNum;

use crate::store::MailStore;

/// Returns the sequence numbers of unseen messages in `mailbox`.
///
/// The folder is opened read-only. A failure to open or search it is
/// logged and reported as no messages, so the cycle turns into a no-op.
pub async fn find_unread<S: MailStore>(store: &mut S, mailbox: &str) -> Vec<SeqNum> {
    tracing::debug!(mailbox, "Opening folder for search");
    if let Err(err) = store.examine(mailbox).await {
        tracing::error!(mailbox, error = %err, "Cannot open folder");
        return Vec::new();
    }

    match store.search_unseen().await {
        Ok(ids) => {
            tracing::debug!(mailbox, count = ids.len(), "Found unread messages");
            ids
        }
        Err(err) => {
            tracing::error!(mailbox, error = %err, "Search for unread messages failed");
            Vec::new()
        }
    }
}
