//! MIME part classification.

use mail_parser::{MessagePart, MimeHeaders, PartType};

use crate::artifact::ArtifactKind;

/// How a leaf part presents itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Body part, named (if at all) by the content-type `name` parameter.
    Inline {
        /// `name` parameter of the content type.
        name: Option<String>,
    },
    /// `Content-Disposition: attachment`, named by its `filename` parameter.
    Attachment {
        /// `filename` parameter of the disposition.
        filename: Option<String>,
    },
}

/// A part that will be written to the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Kind used for dispatch.
    pub kind: ArtifactKind,
    /// Inline or attachment, with the declared name.
    pub part: Part,
    /// Appended to the message stem to form the artifact path.
    pub suffix: String,
}

impl Part {
    /// Reads disposition and declared name from a part's headers.
    #[must_use]
    pub fn of(part: &MessagePart<'_>) -> Self {
        match part.content_disposition() {
            Some(disposition) if disposition.is_attachment() => Self::Attachment {
                filename: disposition.attribute("filename").map(str::to_string),
            },
            _ => Self::Inline {
                name: part
                    .content_type()
                    .and_then(|ct| ct.attribute("name"))
                    .map(str::to_string),
            },
        }
    }

    /// The declared file name, whichever header it came from.
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Self::Inline { name } => name.as_deref(),
            Self::Attachment { filename } => filename.as_deref(),
        }
    }
}

/// Decides whether a part is printed and under which suffix.
///
/// Containers and nested messages are never printed themselves. A text
/// body without a content type is plain text.
#[must_use]
pub fn classify(part: &MessagePart<'_>) -> Option<Classified> {
    let kind = match (&part.body, part.content_type()) {
        (PartType::Multipart(_) | PartType::Message(_), _) => return None,
        (_, Some(ct)) => ArtifactKind::classify(ct.ctype(), ct.subtype().unwrap_or_default())?,
        (PartType::Html(_), None) => ArtifactKind::Html,
        (PartType::Text(_), None) => ArtifactKind::Text,
        (PartType::Binary(_) | PartType::InlineBinary(_), None) => return None,
    };

    let part_kind = Part::of(part);
    let suffix = match kind {
        ArtifactKind::Html => ".html".to_string(),
        ArtifactKind::Text => ".txt".to_string(),
        ArtifactKind::Pdf | ArtifactKind::Image => match part_kind.declared_name() {
            Some(name) if !sanitize(name).is_empty() => format!("-{}", sanitize(name)),
            _ => format!("-attachment.{}", fallback_extension(kind, part)),
        },
    };

    Some(Classified {
        kind,
        part: part_kind,
        suffix,
    })
}

/// Reduces a declared file name to something safe inside the spool
/// directory: no separators, no control characters, no leading dots.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

fn fallback_extension(kind: ArtifactKind, part: &MessagePart<'_>) -> String {
    match kind {
        ArtifactKind::Pdf => "pdf".to_string(),
        _ => part
            .content_type()
            .and_then(|ct| ct.subtype())
            .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase),
    }
}
