//! Owned mail store session with on-demand reconnection.
//!
//! `Session` wraps the protocol client and tracks which of the four states
//! the connection is in. Every command goes through [`Session::settle`], so
//! a transport failure observed anywhere drops the session back to
//! [`SessionState::Disconnected`] and the next [`Session::reconnect`] starts
//! from scratch.
//!
//! ## Example
//!
//! ```ignore
//! use mailprint_imap::{Config, Flag, SequenceSet, Session};
//!
//! let mut session = Session::connect(config).await?;
//! session.select("Printed").await?;
//! let unseen: SequenceSet = session.search_unseen().await?.into_iter().collect();
//! session.add_flags(&unseen, &[Flag::Seen]).await?;
//! session.logout().await?;
//! ```

use async_imap::types::Fetch;
use futures::{Stream, TryStreamExt};

use super::{Config, MailStream, Security, connect_plain, connect_tls};
use crate::types::{Flag, SeqNum, SequenceSet};
use crate::{Error, Result};

type Client = async_imap::Client<MailStream>;
type Authed = async_imap::Session<MailStream>;

/// Observable state of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No live transport.
    Disconnected,
    /// Transport is up and greeted but login has not succeeded.
    Connected,
    /// Logged in, no mailbox open.
    Authenticated,
    /// Logged in with the named mailbox open.
    Selected(String),
}

impl SessionState {
    /// Returns true for every state that has a live transport.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

#[derive(Debug)]
struct Selection {
    name: String,
    read_only: bool,
}

enum Link {
    Disconnected,
    Connected(Client),
    Open {
        session: Authed,
        selected: Option<Selection>,
    },
}

/// Authenticated connection to the mail store.
pub struct Session {
    config: Config,
    link: Link,
}

impl Session {
    /// Creates a session in the disconnected state without dialing.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            link: Link::Disconnected,
        }
    }

    /// Dials the server, upgrades or negotiates TLS, and logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be established or the
    /// server rejects the credentials.
    pub async fn connect(config: Config) -> Result<Self> {
        let mut session = Self::new(config);
        session.reconnect().await?;
        Ok(session)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.link {
            Link::Disconnected => SessionState::Disconnected,
            Link::Connected(_) => SessionState::Connected,
            Link::Open { selected: None, .. } => SessionState::Authenticated,
            Link::Open {
                selected: Some(selection),
                ..
            } => SessionState::Selected(selection.name.clone()),
        }
    }

    /// Tears down whatever is live and runs a fresh connect and login.
    ///
    /// A rejected login leaves the session in [`SessionState::Connected`];
    /// it is not retried.
    ///
    /// # Errors
    ///
    /// Returns an error if dialing, the greeting, STARTTLS or login fails.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.link = Link::Disconnected;
        tracing::debug!(address = %self.config.address(), "Dialing mail store");

        self.do_connect().await?;
        self.do_authenticate().await
    }

    /// Opens a mailbox read-only. Returns the number of messages in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not authenticated or the server
    /// refuses the mailbox.
    pub async fn examine(&mut self, mailbox: &str) -> Result<u32> {
        let result = self.open_mailbox(mailbox, true).await;
        self.settle(result)
    }

    /// Opens a mailbox read-write. Returns the number of messages in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not authenticated or the server
    /// refuses the mailbox.
    pub async fn select(&mut self, mailbox: &str) -> Result<u32> {
        let result = self.open_mailbox(mailbox, false).await;
        self.settle(result)
    }

    /// Searches the open mailbox for messages without `\Seen`.
    ///
    /// Numbers come back ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the search fails.
    pub async fn search_unseen(&mut self) -> Result<Vec<SeqNum>> {
        let result = self.try_search_unseen().await;
        self.settle(result)
    }

    /// Starts a fetch of `query` for every message in `set`.
    ///
    /// The returned stream borrows the session. Failures from the stream,
    /// and from this call, are not recorded on the session; hand them to
    /// [`Session::settle`] once the stream has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the command is rejected.
    pub async fn fetch(
        &mut self,
        set: &SequenceSet,
        query: &str,
    ) -> Result<impl Stream<Item = Result<Fetch>> + Send + '_> {
        let session = self.selected(false)?;
        let fetches = session.fetch(set.to_string(), query.to_string()).await?;
        Ok(fetches.map_err(Error::from))
    }

    /// Moves the messages in `set` out of the open mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is not open read-write or the server
    /// rejects the move.
    pub async fn mv(&mut self, set: &SequenceSet, mailbox: &str) -> Result<()> {
        let result = self.try_mv(set, mailbox).await;
        self.settle(result)
    }

    /// Adds `flags` to every message in `set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is not open read-write or the store
    /// command fails.
    pub async fn add_flags(&mut self, set: &SequenceSet, flags: &[Flag]) -> Result<()> {
        let result = self.try_add_flags(set, flags).await;
        self.settle(result)
    }

    /// Logs out and drops the transport. A disconnected session is left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not acknowledge the logout. The
    /// session is disconnected either way.
    pub async fn logout(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.link, Link::Disconnected) {
            Link::Disconnected => Ok(()),
            Link::Connected(mut client) => {
                client.run_command_and_check_ok("LOGOUT", None).await?;
                Ok(())
            }
            Link::Open { mut session, .. } => {
                session.logout().await?;
                Ok(())
            }
        }
    }

    /// Records the outcome of a command.
    ///
    /// An error that means the transport is gone drops the session to
    /// [`SessionState::Disconnected`]; everything else passes through.
    ///
    /// # Errors
    ///
    /// Returns `result` unchanged when it is an error.
    pub fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|err| {
            if err.is_connection_lost() && !matches!(self.link, Link::Disconnected) {
                tracing::warn!(error = %err, "Mail store connection lost");
                self.link = Link::Disconnected;
            }
            err
        })
    }

    // === Private helpers ===

    async fn do_connect(&mut self) -> Result<()> {
        let config = &self.config;
        let client = match config.security {
            Security::Implicit => {
                let stream = connect_tls(&config.host, config.port, config.connect_timeout).await?;
                let mut client = Client::new(stream);
                read_greeting(&mut client).await?;
                client
            }
            Security::StartTls => {
                let stream =
                    connect_plain(&config.host, config.port, config.connect_timeout).await?;
                let mut client = Client::new(stream);
                read_greeting(&mut client).await?;
                client.run_command_and_check_ok("STARTTLS", None).await?;
                tracing::debug!("STARTTLS accepted, upgrading transport");

                let stream = client.into_inner().upgrade_to_tls(&config.host).await?;
                Client::new(stream)
            }
        };

        tracing::debug!(address = %config.address(), "Connected");
        self.link = Link::Connected(client);
        Ok(())
    }

    async fn do_authenticate(&mut self) -> Result<()> {
        let Link::Connected(client) = std::mem::replace(&mut self.link, Link::Disconnected) else {
            return Err(Error::InvalidState("not connected".into()));
        };

        let credentials = &self.config.credentials;
        match client.login(&credentials.username, &credentials.password).await {
            Ok(session) => {
                tracing::debug!(username = %credentials.username, "Authenticated");
                self.link = Link::Open {
                    session,
                    selected: None,
                };
                Ok(())
            }
            Err((source, client)) => {
                self.link = Link::Connected(client);
                Err(Error::Auth {
                    username: credentials.username.clone(),
                    source,
                })
            }
        }
    }

    async fn open_mailbox(&mut self, mailbox: &str, read_only: bool) -> Result<u32> {
        let Link::Open { session, selected } = &mut self.link else {
            return Err(Error::InvalidState("not authenticated".into()));
        };

        // A failed SELECT/EXAMINE leaves no mailbox open.
        *selected = None;
        let status = if read_only {
            session.examine(mailbox).await?
        } else {
            session.select(mailbox).await?
        };
        *selected = Some(Selection {
            name: mailbox.to_string(),
            read_only,
        });

        tracing::debug!(mailbox, read_only, exists = status.exists, "Mailbox opened");
        Ok(status.exists)
    }

    async fn try_search_unseen(&mut self) -> Result<Vec<SeqNum>> {
        let session = self.selected(false)?;
        let found = session.search("UNSEEN").await?;

        let mut seqs: Vec<SeqNum> = found.into_iter().filter_map(SeqNum::new).collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn try_mv(&mut self, set: &SequenceSet, mailbox: &str) -> Result<()> {
        let session = self.selected(true)?;
        session.mv(set.to_string(), mailbox).await?;
        Ok(())
    }

    async fn try_add_flags(&mut self, set: &SequenceSet, flags: &[Flag]) -> Result<()> {
        let query = format!("+FLAGS.SILENT {}", Flag::list(flags));
        let session = self.selected(true)?;
        let updates = session.store(set.to_string(), &query).await?;
        updates.try_for_each(|_| futures::future::ready(Ok(()))).await?;
        Ok(())
    }

    /// Returns the protocol session if a mailbox is open, and writable when
    /// `writable` is set.
    fn selected(&mut self, writable: bool) -> Result<&mut Authed> {
        match &mut self.link {
            Link::Open {
                session,
                selected: Some(selection),
            } => {
                if writable && selection.read_only {
                    return Err(Error::InvalidState(format!(
                        "{} is open read-only",
                        selection.name
                    )));
                }
                Ok(session)
            }
            Link::Open { selected: None, .. } => {
                Err(Error::InvalidState("no mailbox selected".into()))
            }
            Link::Connected(_) => Err(Error::InvalidState("not authenticated".into())),
            Link::Disconnected => Err(Error::InvalidState("not connected".into())),
        }
    }
}

async fn read_greeting(client: &mut Client) -> Result<()> {
    client.read_response().await?.ok_or(Error::Greeting)?;
    Ok(())
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    async fn local_config(listener: &TcpListener) -> Config {
        let port = listener.local_addr().unwrap().port();
        Config::new("127.0.0.1", Security::StartTls)
            .with_port(port)
            .with_credentials("printer", "secret")
            .with_connect_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = Session::new(Config::new("imap.example.com", Security::Implicit));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.state().is_connected());
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let mut session = Session::new(Config::new("imap.example.com", Security::Implicit));

        let err = session.examine("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let set: SequenceSet = [SeqNum::new(1).unwrap()].into_iter().collect();
        let err = session.mv(&set, "Printed").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_logout_when_disconnected_is_noop() {
        let mut session = Session::new(Config::new("imap.example.com", Security::Implicit));
        assert!(session.logout().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_greeting_is_connection_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener).await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let err = Session::connect(config).await.unwrap_err();
        assert!(err.is_connection_lost(), "unexpected error: {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_starttls_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener).await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            write.write_all(b"* OK test server ready\r\n").await.unwrap();
            let command = lines.next_line().await.unwrap().expect("STARTTLS line");
            let tag = command.split_whitespace().next().unwrap().to_string();
            assert!(command.ends_with("STARTTLS"), "got {command}");

            write
                .write_all(format!("{tag} NO TLS not available\r\n").as_bytes())
                .await
                .unwrap();
        });

        let err = Session::connect(config).await.unwrap_err();
        assert!(matches!(err, Error::Imap(_)), "unexpected error: {err:?}");
        server.await.unwrap();
    }

    #[test]
    fn test_settle_keeps_session_on_command_error() {
        let mut session = Session::new(Config::new("imap.example.com", Security::Implicit));
        let result: Result<()> = Err(Error::InvalidState("no mailbox selected".into()));
        assert!(session.settle(result).is_err());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_debug_output() {
        let session = Session::new(Config::new("imap.example.com", Security::Implicit));
        let rendered = format!("{session:?}");
        assert!(rendered.contains("imap.example.com"));
        assert!(rendered.contains("Disconnected"));
    }
}
