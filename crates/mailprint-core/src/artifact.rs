//! Temporary files produced from message parts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mailprint_imap::SeqNum;

/// Declared content kind of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// `text/html`, converted to PDF before printing.
    Html,
    /// `text/plain`.
    Text,
    /// `application/pdf` attachment.
    Pdf,
    /// Any `image/*` attachment.
    Image,
}

impl ArtifactKind {
    /// Classifies a MIME type. Returns `None` for types that are not printed.
    #[must_use]
    pub fn classify(ctype: &str, subtype: &str) -> Option<Self> {
        let ctype = ctype.to_ascii_lowercase();
        let subtype = subtype.to_ascii_lowercase();
        match (ctype.as_str(), subtype.as_str()) {
            ("text", "html") => Some(Self::Html),
            ("text", "plain") => Some(Self::Text),
            ("application", "pdf") => Some(Self::Pdf),
            ("image", _) => Some(Self::Image),
            _ => None,
        }
    }
}

/// One file in the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// What the part declared itself to be.
    pub kind: ArtifactKind,
    /// Message the part came from.
    pub message: SeqNum,
}

/// Artifacts of one cycle, in insertion order, unique by path.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    items: Vec<Artifact>,
    paths: HashSet<PathBuf>,
}

impl ArtifactSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact. Returns false, leaving the set unchanged, if the
    /// path is already present.
    pub fn insert(&mut self, artifact: Artifact) -> bool {
        if !self.paths.insert(artifact.path.clone()) {
            return false;
        }
        self.items.push(artifact);
        true
    }

    /// Returns true if an artifact with this path is present.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Iterates artifacts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.items.iter()
    }

    /// Returns the number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes every artifact from the set. Files are left alone.
    pub fn clear(&mut self) {
        self.items.clear();
        self.paths.clear();
    }
}
