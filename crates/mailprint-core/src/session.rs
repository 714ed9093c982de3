//! Session manager: initial connect and lazy reconnect.

use mailprint_imap::{Session, SessionState};

use crate::settings::Settings;
use crate::store::MailStore;
use crate::{Error, Result};

/// Connects and logs in with the configured account.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unusable `imap_uri` and
/// [`Error::Connection`] if dialing or login fails.
pub async fn connect(settings: &Settings) -> Result<Session> {
    let config = settings.session_config()?;
    tracing::info!(
        username = %settings.username,
        address = %config.address(),
        security = ?config.security,
        "Logging in"
    );

    let session = Session::connect(config).await.map_err(Error::Connection)?;
    tracing::info!("Logged in");
    Ok(session)
}

/// Makes sure `store` has a live connection.
///
/// A disconnected store gets exactly one fresh connect and login; any other
/// state is left alone.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the reconnect fails.
pub async fn ensure_connected<S: MailStore>(store: &mut S) -> Result<()> {
    let state = store.state();
    tracing::debug!(?state, "Checking session state");

    match state {
        SessionState::Connected | SessionState::Authenticated | SessionState::Selected(_) => {
            Ok(())
        }
        SessionState::Disconnected => {
            tracing::info!("Session disconnected, reconnecting");
            store.reconnect().await.map_err(Error::Connection)
        }
    }
}
