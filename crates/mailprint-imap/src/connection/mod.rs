//! Mail store connection management.
//!
//! This module provides:
//! - Configuration (host, port, security mode, credentials)
//! - TLS/plaintext stream abstraction with wire tracing
//! - The owned [`Session`] with lazy reconnect

mod config;
mod session;
mod stream;

pub use config::{Config, Credentials, Security};
pub use session::{Session, SessionState};
pub use stream::{MailStream, connect_plain, connect_tls, tls_connector};
