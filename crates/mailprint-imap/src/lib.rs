//! # mailprint-imap
//!
//! Mail store session used by the mailprint pipeline.
//!
//! The wire protocol itself is delegated to `async-imap`; this crate owns the
//! parts the pipeline cares about:
//!
//! - **Transport**: implicit TLS or plaintext upgraded with STARTTLS, both via
//!   rustls with the webpki root store
//! - **Session lifecycle**: a single owned [`Session`] that tracks whether it
//!   is disconnected, connected, authenticated or has a mailbox selected, and
//!   that can be re-established on demand
//! - **Identifiers**: [`SeqNum`] and the compact [`SequenceSet`] used for
//!   fetch, move and store commands
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailprint_imap::{Config, Security, Session, SequenceSet};
//!
//! let config = Config::new("imap.example.com", Security::StartTls)
//!     .with_credentials("printer@example.com", "secret");
//!
//! let mut session = Session::connect(config).await?;
//! session.examine("INBOX").await?;
//! let unread = session.search_unseen().await?;
//! let set: SequenceSet = unread.into_iter().collect();
//! println!("fetching {set}");
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── reconnect() ──→ Connected ── login ──→ Authenticated
//!      ▲                                                      │
//!      │                                           examine()/select()
//!      │                                                      ▼
//!      └──────────── transport failure ──────────────── Selected(mailbox)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod connection;
mod error;
pub mod types;

pub use connection::{Config, Credentials, MailStream, Security, Session, SessionState};
pub use error::{Error, Result};
pub use types::{Flag, SeqNum, SequenceSet};
