//! # mailprint-core
//!
//! The mail-to-printer pipeline.
//!
//! One [`Monitor::run_cycle`] walks every unread message in the source
//! folder through these stages:
//!
//! - **Session**: make sure the [`MailStore`] is connected, reconnecting once
//!   if it is not
//! - **Locator**: open the source folder read-only and search for unseen
//!   messages
//! - **Fetcher**: a background task streams full bodies into a bounded queue
//! - **Extractor**: decode each message and write its printable parts to the
//!   spool directory, deduplicated by path
//! - **Dispatcher**: convert HTML to PDF, print, and remove every artifact
//! - **Relocator**: move the extracted messages to the destination folder and
//!   mark everything unseen there as seen
//!
//! Stages are generic over [`MailStore`], which is implemented for
//! [`mailprint_imap::Session`], and over [`Spooler`] for the external
//! converter and printer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod dispatch;
mod error;
pub mod extract;
pub mod fetcher;
pub mod locator;
pub mod monitor;
pub mod relocate;
pub mod session;
pub mod settings;
pub mod store;

pub use artifact::{Artifact, ArtifactKind, ArtifactSet};
pub use dispatch::{CommandSpooler, Spooler, dispatch_all};
pub use error::{Error, Result};
pub use extract::Extractor;
pub use fetcher::{FETCH_QUEUE_CAPACITY, FetchHandle};
pub use monitor::{CycleReport, Monitor};
pub use settings::Settings;
pub use store::{MailStore, MessageEnvelope};
