//! Byte transport under the protocol client.
//!
//! Every byte read or written passes through [`MailStream`], which logs it
//! at `trace` under the `mailprint_imap::wire` target. That target is only
//! enabled at the highest verbosity since it shows the `LOGIN` line.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

const WIRE_TARGET: &str = "mailprint_imap::wire";

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// TCP connection to the mail store, encrypted or not yet encrypted.
///
/// `Plain` only exists between the dial and a `STARTTLS` upgrade; logins
/// always happen over `Tls`.
pub enum MailStream {
    /// Fresh TCP connection awaiting `STARTTLS`.
    Plain(TcpStream),
    /// Encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Runs the TLS handshake over a plaintext connection.
    ///
    /// # Errors
    ///
    /// Fails on an already encrypted stream, a host that is not a valid
    /// server name, or a failed handshake.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        let Self::Plain(tcp) = self else {
            return Err(Error::InvalidState("transport is already encrypted".into()));
        };
        handshake(tcp, host).await
    }

    /// Whether the transport is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    fn io(self: Pin<&mut Self>) -> Pin<&mut dyn Io> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp as &mut dyn Io),
            Self::Tls(tls) => Pin::new(&mut **tls as &mut dyn Io),
        }
    }
}

impl std::fmt::Debug for MailStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_tls() { "MailStream::Tls" } else { "MailStream::Plain" })
    }
}

fn trace_bytes(direction: &str, bytes: &[u8]) {
    if !bytes.is_empty() {
        tracing::trace!(
            target: WIRE_TARGET,
            "{direction} {}",
            String::from_utf8_lossy(bytes).trim_end()
        );
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let start = buf.filled().len();
        let poll = self.io().poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) {
            trace_bytes("S:", &buf.filled()[start..]);
        }
        poll
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = self.io().poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            trace_bytes("C:", &buf[..*n]);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.io().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.io().poll_shutdown(cx)
    }
}

/// TLS client trusting the bundled webpki roots.
#[must_use]
pub fn tls_connector() -> TlsConnector {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<MailStream> {
    let name = ServerName::try_from(host.to_string())?;
    let tls = tls_connector().connect(name, tcp).await?;
    Ok(MailStream::Tls(Box::new(tls)))
}

async fn dial(host: &str, port: u16) -> Result<TcpStream> {
    Ok(TcpStream::connect((host, port)).await?)
}

/// Dials and completes the TLS handshake within `limit`.
///
/// # Errors
///
/// [`Error::Timeout`] when `limit` runs out, otherwise the dial or
/// handshake failure.
pub async fn connect_tls(host: &str, port: u16, limit: Duration) -> Result<MailStream> {
    let attempt = async { handshake(dial(host, port).await?, host).await };
    tokio::time::timeout(limit, attempt)
        .await
        .map_err(|_| Error::Timeout(format!("{host}:{port}")))?
}

/// Dials without encryption, ahead of `STARTTLS`.
///
/// # Errors
///
/// [`Error::Timeout`] when `limit` runs out, otherwise the dial failure.
pub async fn connect_plain(host: &str, port: u16, limit: Duration) -> Result<MailStream> {
    let tcp = tokio::time::timeout(limit, dial(host, port))
        .await
        .map_err(|_| Error::Timeout(format!("{host}:{port}")))??;
    Ok(MailStream::Plain(tcp))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn refused_dial_counts_as_connection_lost() {
        let port = unused_port();
        let err = connect_plain("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_connection_lost(), "{err:?}");
    }

    #[tokio::test]
    async fn plain_dial_is_unencrypted() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_plain("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!stream.is_tls());
        assert_eq!(format!("{stream:?}"), "MailStream::Plain");
    }

    #[tokio::test]
    async fn bad_server_name_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_plain("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        let err = stream.upgrade_to_tls("not a host!").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)), "{err:?}");
    }
}
