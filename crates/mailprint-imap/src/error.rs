//! Error types for the session library.

use thiserror::Error;

/// Errors that can occur while talking to the mail store.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Error reported by the protocol layer.
    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),

    /// The server closed the connection before sending a greeting.
    #[error("Server did not send a greeting")]
    Greeting,

    /// Authentication failed.
    #[error("Authentication failed for {username}: {source}")]
    Auth {
        /// Account the login was attempted for.
        username: String,
        /// Underlying protocol error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Dialing the server took longer than the configured timeout.
    #[error("Connection to {0} timed out")]
    Timeout(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true if the error means the underlying connection is gone.
    ///
    /// A session that observes such an error drops back to
    /// [`SessionState::Disconnected`](crate::SessionState::Disconnected).
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Greeting
                | Self::Timeout(_)
                | Self::Imap(async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_connection_lost() {
        let io = Error::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(io.is_connection_lost());
        assert!(Error::Imap(async_imap::error::Error::ConnectionLost).is_connection_lost());
        assert!(Error::Greeting.is_connection_lost());
    }

    #[test]
    fn test_command_errors_keep_connection() {
        let no = Error::Imap(async_imap::error::Error::No("mailbox missing".into()));
        assert!(!no.is_connection_lost());
        assert!(!Error::InvalidState("no mailbox selected".into()).is_connection_lost());
    }
}
