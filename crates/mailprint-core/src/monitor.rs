//! One monitoring cycle, start to finish.

use mailprint_imap::SequenceSet;

use crate::artifact::ArtifactSet;
use crate::dispatch::{DispatchReport, Spooler, dispatch_all, remove_artifact};
use crate::extract::Extractor;
use crate::relocate::{mark_seen, relocate};
use crate::session::ensure_connected;
use crate::settings::Settings;
use crate::store::MailStore;
use crate::{Result, fetcher, locator};

/// What a cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unread messages found in the source folder.
    pub found: usize,
    /// Envelopes received from the fetch task.
    pub fetched: usize,
    /// Messages whose parts were all written.
    pub extracted: usize,
    /// Artifact files written.
    pub artifacts: usize,
    /// Printing outcome.
    pub dispatch: DispatchReport,
    /// Messages moved to the destination folder.
    pub moved: usize,
    /// Messages flagged seen in the destination folder.
    pub marked_seen: usize,
}

/// Runs the pipeline against a mail store.
#[derive(Debug)]
pub struct Monitor<P> {
    source: String,
    destination: String,
    extractor: Extractor,
    spooler: P,
}

impl<P: Spooler> Monitor<P> {
    /// Creates a monitor for the configured folders and spool directory.
    #[must_use]
    pub fn new(settings: &Settings, spooler: P) -> Self {
        Self {
            source: settings.source_folder.clone(),
            destination: settings.destination_folder.clone(),
            extractor: Extractor::new(settings.spool_dir()),
            spooler,
        }
    }

    /// Runs one cycle and hands the store back.
    ///
    /// Search, fetch, print, move and flag failures are logged and the
    /// cycle continues with what it has.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be connected, an artifact cannot
    /// be written, or the fetch task dies. The store is lost in those cases.
    /// Artifacts written so far are removed before returning.
    pub async fn run_cycle<S: MailStore>(&mut self, mut store: S) -> Result<(S, CycleReport)> {
        let mut report = CycleReport::default();

        ensure_connected(&mut store).await?;

        tracing::debug!(mailbox = %self.source, "Fetching unread messages");
        let ids = locator::find_unread(&mut store, &self.source).await;
        if ids.is_empty() {
            tracing::info!(mailbox = %self.source, "No unread messages");
            return Ok((store, report));
        }
        report.found = ids.len();
        tracing::info!(mailbox = %self.source, count = ids.len(), "Found unread messages");

        let mut fetch = fetcher::spawn(store, ids.into_iter().collect());
        let mut artifacts = ArtifactSet::new();
        let mut extracted = SequenceSet::new();
        let mut fatal = None;

        while let Some(envelope) = fetch.next().await {
            report.fetched += 1;
            match self.extractor.extract(&envelope, &mut artifacts).await {
                Ok(written) => {
                    report.artifacts += written;
                    extracted.insert(envelope.seq);
                }
                Err(err) if !err.is_fatal() => {
                    tracing::warn!(seq = %envelope.seq, error = %err, "Skipping message");
                }
                Err(err) => {
                    fatal = Some(err);
                    break;
                }
            }
        }

        let (mut store, outcome) = fetch.finish().await?;
        match outcome {
            Ok(delivered) => tracing::debug!(delivered, "Fetching done"),
            Err(err) => tracing::error!(error = %err, "Fetching failed"),
        }

        if let Some(err) = fatal {
            for artifact in artifacts.iter() {
                remove_artifact(&artifact.path).await;
            }
            return Err(err);
        }
        report.extracted = extracted.len();

        tracing::debug!(count = artifacts.len(), "Sending artifacts to the printer");
        report.dispatch = dispatch_all(&self.spooler, &mut artifacts).await;

        if !extracted.is_empty() {
            match relocate(&mut store, &self.source, &extracted, &self.destination).await {
                Ok(()) => report.moved = extracted.len(),
                Err(err) => tracing::error!(error = %err, "Moving messages failed"),
            }
        }

        match mark_seen(&mut store, &self.destination).await {
            Ok(flagged) => report.marked_seen = flagged,
            Err(err) => tracing::error!(error = %err, "Marking messages read failed"),
        }

        tracing::info!(
            found = report.found,
            printed = report.dispatch.printed,
            moved = report.moved,
            "Cycle finished"
        );
        Ok((store, report))
    }
}
