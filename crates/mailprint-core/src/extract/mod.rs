//! Content extractor.
//!
//! Each fetched message is decoded and its printable parts are written to
//! the spool directory as `mailprint-<stem><suffix>`, where the stem is a
//! fresh random identifier per message and the suffix comes from
//! [`part::classify`]. Text and HTML bodies get the [`HeaderBlock`] in
//! front of them.

mod header;
mod part;

use std::io;
use std::path::{Path, PathBuf};

use mail_parser::{Message, MessageParser};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::AsyncWriteExt;

pub use header::{HeaderBlock, SEPARATOR};
pub use part::{Classified, Part, classify, sanitize};

use crate::artifact::{Artifact, ArtifactKind, ArtifactSet};
use crate::dispatch::remove_artifact;
use crate::store::MessageEnvelope;
use crate::{Error, Result};

/// Prefix shared by every artifact file name.
pub const FILE_PREFIX: &str = "mailprint-";

const STEM_LEN: usize = 16;

/// Writes printable message parts to the spool directory.
#[derive(Debug)]
pub struct Extractor {
    spool_dir: PathBuf,
    rng: StdRng,
}

impl Extractor {
    /// Creates an extractor writing into `spool_dir`.
    #[must_use]
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Writes every printable part of `envelope` and records it in
    /// `artifacts`. Returns the number of new files.
    ///
    /// A part with an empty body is skipped, and a part whose path is
    /// already in `artifacts` is not written again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Undecodable`] if a literal is not a message, and
    /// [`Error::Extract`] if a file cannot be created or written. Files
    /// written before the error stay in `artifacts`.
    pub async fn extract(
        &mut self,
        envelope: &MessageEnvelope,
        artifacts: &mut ArtifactSet,
    ) -> Result<usize> {
        if envelope.literals.is_empty() {
            return Err(Error::Undecodable(envelope.seq));
        }

        let name = format!("{FILE_PREFIX}{}", self.random_stem());
        let stem = self.spool_dir.join(name);
        let mut written = 0;

        for literal in &envelope.literals {
            let message = MessageParser::default()
                .parse(literal.as_slice())
                .ok_or(Error::Undecodable(envelope.seq))?;
            written += self
                .write_parts(envelope, &message, &stem, artifacts)
                .await?;
        }

        tracing::debug!(seq = %envelope.seq, written, "Extracted message");
        Ok(written)
    }

    fn random_stem(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(STEM_LEN)
            .map(char::from)
            .collect()
    }

    async fn write_parts(
        &self,
        envelope: &MessageEnvelope,
        message: &Message<'_>,
        stem: &Path,
        artifacts: &mut ArtifactSet,
    ) -> Result<usize> {
        let header = HeaderBlock::from_message(message);
        tracing::debug!(
            seq = %envelope.seq,
            date = %header.date,
            from = %header.from,
            to = %header.to,
            cc = %header.cc,
            subject = %header.subject,
            "Decoded message"
        );

        let mut written = 0;
        for part in &message.parts {
            let Some(classified) = classify(part) else {
                continue;
            };
            let body = part.contents();
            if body.is_empty() {
                tracing::debug!(seq = %envelope.seq, suffix = %classified.suffix, "Empty part, skipping");
                continue;
            }

            let path = with_suffix(stem, &classified.suffix);
            if artifacts.contains(&path) {
                tracing::debug!(path = %path.display(), "Duplicate artifact path, skipping part");
                continue;
            }

            let prefix = match classified.kind {
                ArtifactKind::Text => Some(header.render_text()),
                ArtifactKind::Html => Some(header.render_html()),
                ArtifactKind::Pdf | ArtifactKind::Image => None,
            };
            write_artifact(&path, prefix.as_deref(), body).await?;

            artifacts.insert(Artifact {
                path,
                kind: classified.kind,
                message: envelope.seq,
            });
            written += 1;
        }
        Ok(written)
    }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

/// Creates `path` holding `prefix` then `body`. A file that cannot be
/// written completely is removed again.
async fn write_artifact(path: &Path, prefix: Option<&str>, body: &[u8]) -> Result<()> {
    let fail = |source| Error::Extract {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::create(path).await.map_err(fail)?;
    if let Err(err) = fill(file, prefix, body).await {
        remove_artifact(path).await;
        return Err(fail(err));
    }

    tracing::trace!(path = %path.display(), bytes = body.len(), "Wrote artifact");
    Ok(())
}

async fn fill(mut file: tokio::fs::File, prefix: Option<&str>, body: &[u8]) -> io::Result<()> {
    if let Some(prefix) = prefix {
        file.write_all(prefix.as_bytes()).await?;
    }
    file.write_all(body).await?;
    file.flush().await
}
