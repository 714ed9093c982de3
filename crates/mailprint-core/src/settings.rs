//! Settings file loading.
//!
//! The settings file is YAML, read once at startup:
//!
//! ```yaml
//! IMAPUri: imap.example.com:993
//! Username: printer@example.com
//! Password: secret
//! SourceFolder: INBOX
//! DestinationFolder: Printed
//! TLS: true
//! DebugLevel: 0
//! ```
//!
//! `Converter`, `Printer` and `SpoolDir` are optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mailprint_imap::{Config, Security};
use serde::Deserialize;

use crate::{Error, Result};

/// Default settings file, relative to the working directory.
pub const DEFAULT_PATH: &str = "settings.yaml";

/// Limit on dialing the mail store.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable run configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Settings {
    /// Mail store address: `host`, `host:port`, `imaps://host[:port]` or
    /// `imap://host[:port]`.
    #[serde(rename = "IMAPUri")]
    pub imap_uri: String,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Folder searched for unread messages.
    #[serde(default = "default_source_folder")]
    pub source_folder: String,
    /// Folder printed messages are moved to.
    pub destination_folder: String,
    /// Direct TLS when true, STARTTLS upgrade when false. A URI scheme wins.
    #[serde(rename = "TLS", default = "default_tls")]
    pub tls: bool,
    /// 0 is quiet, 1 traces each stage, 2 and up adds the raw protocol.
    #[serde(default)]
    pub debug_level: u8,
    /// HTML to PDF converter, run as `<converter> <input.html> <output.pdf>`.
    #[serde(default = "default_converter")]
    pub converter: String,
    /// Print command, run as `<printer> <path>`.
    #[serde(default = "default_printer")]
    pub printer: String,
    /// Where artifacts are written. Defaults to the system temp directory.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

fn default_source_folder() -> String {
    "INBOX".to_string()
}

const fn default_tls() -> bool {
    true
}

fn default_converter() -> String {
    "wkhtmltopdf".to_string()
}

fn default_printer() -> String {
    "lp".to_string()
}

/// Where and how to dial the mail store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
}

impl Settings {
    /// Reads and validates the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not valid YAML, has
    /// unknown keys, or has an unusable value.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parses settings from YAML text. `origin` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is invalid or a value is unusable.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(text).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Replaces the verbosity level.
    #[must_use]
    pub const fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Returns the spool directory for artifacts.
    #[must_use]
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Splits `IMAPUri` into host, port and security mode.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown scheme, an empty host or a bad port.
    pub fn endpoint(&self) -> Result<Endpoint> {
        let uri = self.imap_uri.trim();
        let (security, rest) = if let Some(rest) = uri.strip_prefix("imaps://") {
            (Security::Implicit, rest)
        } else if let Some(rest) = uri.strip_prefix("imap://") {
            (Security::StartTls, rest)
        } else if uri.contains("://") {
            return Err(Error::Config(format!("unsupported scheme in IMAPUri `{uri}`")));
        } else if self.tls {
            (Security::Implicit, uri)
        } else {
            (Security::StartTls, uri)
        };

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = split_host_port(authority)?;
        if host.is_empty() {
            return Err(Error::Config(format!("no host in IMAPUri `{uri}`")));
        }

        Ok(Endpoint {
            host: host.to_string(),
            port: port.unwrap_or_else(|| security.default_port()),
            security,
        })
    }

    /// Builds the session configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `IMAPUri` cannot be parsed.
    pub fn session_config(&self) -> Result<Config> {
        let endpoint = self.endpoint()?;
        Ok(Config::new(endpoint.host, endpoint.security)
            .with_port(endpoint.port)
            .with_credentials(&self.username, &self.password)
            .with_connect_timeout(CONNECT_TIMEOUT))
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("IMAPUri", &self.imap_uri),
            ("Username", &self.username),
            ("Password", &self.password),
            ("SourceFolder", &self.source_folder),
            ("DestinationFolder", &self.destination_folder),
            ("Converter", &self.converter),
            ("Printer", &self.printer),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::Config(format!("`{key}` must not be empty")));
        }

        if self.source_folder == self.destination_folder {
            return Err(Error::Config(format!(
                "source and destination folder are both `{}`",
                self.source_folder
            )));
        }

        self.endpoint().map(|_| ())
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>)> {
    // Bracketed IPv6 literal: [::1]:993
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("unterminated `[` in `{authority}`")))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(Error::Config(format!("unexpected `{tail}` after host"))),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => Err(Error::Config(format!(
            "IPv6 address `{authority}` must be written as `[address]:port`"
        ))),
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((authority, None)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| Error::Config(format!("invalid port `{port}`")))
}

// The password never reaches logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("imap_uri", &self.imap_uri)
            .field("username", &self.username)
            .field("source_folder", &self.source_folder)
            .field("destination_folder", &self.destination_folder)
            .field("tls", &self.tls)
            .field("debug_level", &self.debug_level)
            .field("converter", &self.converter)
            .field("printer", &self.printer)
            .field("spool_dir", &self.spool_dir)
            .finish_non_exhaustive()
    }
}
