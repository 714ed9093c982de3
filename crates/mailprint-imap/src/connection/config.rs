//! Where to dial and who to log in as.

use std::time::Duration;

/// How the transport gets encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext dial, then `STARTTLS` before login.
    StartTls,
    /// TLS handshake right after the dial.
    #[default]
    Implicit,
}

impl Security {
    /// Port used when the address does not name one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Login name and password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password, sent with `LOGIN` once the transport is encrypted.
    pub password: String,
}

impl Credentials {
    /// Pairs a login name with its password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a [`Session`](crate::Session) needs to (re)connect.
///
/// ```
/// use mailprint_imap::{Config, Security};
///
/// let config = Config::new("imap.example.com", Security::StartTls)
///     .with_credentials("printer@example.com", "secret");
/// assert_eq!(config.address(), "imap.example.com:143");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP literal.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport encryption.
    pub security: Security,
    /// Account to log in as.
    pub credentials: Credentials,
    /// Limit on the dial plus TLS handshake.
    pub connect_timeout: Duration,
}

impl Config {
    /// Dials `host` on the default port for `security`, with a 30 second
    /// connect limit and no credentials.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the account to log in as.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    /// Overrides the connect limit.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`, as dialed and as logged.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
