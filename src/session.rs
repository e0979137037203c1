/*!

Session negotiation.

Every connection opens exactly one session with the service, and
every secret sent or received on that connection is protected by it.
With [EncryptionType::Dh] the client first offers the Diffie-Hellman
algorithm and falls back to `plain` only if the service answers that
it doesn't support it; any other failure aborts the connection
attempt. Once a session exists its algorithm never changes.

*/

use std::fmt;

use dbus::Path;
use dbus::arg::{RefArg, Variant};
use log::{debug, warn};

use crate::crypto::{KeyPair, SessionKey};
use crate::errors::{Error, Result};
use crate::ss::{
    ALGORITHM_DH, ALGORITHM_PLAIN, ERR_NOT_SUPPORTED, SS_DBUS_NAME, SS_DBUS_PATH, SS_SERVICE_IFACE,
    SS_SESSION_IFACE,
};
use crate::transport::{Transport, method_call};

/// The session algorithm to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    Plain,
    Dh,
}

impl EncryptionType {
    pub fn algorithm(&self) -> &'static str {
        match self {
            EncryptionType::Plain => ALGORITHM_PLAIN,
            EncryptionType::Dh => ALGORITHM_DH,
        }
    }
}

/// A negotiated session: the service-side session object plus, for
/// encrypted sessions, the shared AES key.
pub struct Session {
    path: Path<'static>,
    encryption: EncryptionType,
    key: Option<SessionKey>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("encryption", &self.encryption)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    /// Negotiate a session, preferring `preference`.
    pub(crate) fn open(transport: &dyn Transport, preference: EncryptionType) -> Result<Self> {
        let session = match preference {
            EncryptionType::Plain => open_plain(transport)?,
            EncryptionType::Dh => match open_dh(transport)? {
                Some(session) => session,
                None => {
                    warn!("secret service does not support {ALGORITHM_DH}; using plain session");
                    open_plain(transport)?
                }
            },
        };
        debug!(
            "opened {} session {}",
            session.encryption.algorithm(),
            session.path
        );
        Ok(session)
    }

    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    pub fn encryption(&self) -> EncryptionType {
        self.encryption
    }

    pub(crate) fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// Tell the service to discard this session.
    pub(crate) fn close(&self, transport: &dyn Transport) -> Result<()> {
        close_session(transport, &self.path)
    }

    #[cfg(test)]
    pub(crate) fn for_test(path: &str, key: Option<SessionKey>) -> Self {
        let encryption = if key.is_some() {
            EncryptionType::Dh
        } else {
            EncryptionType::Plain
        };
        Session {
            path: Path::from(path.to_string()),
            encryption,
            key,
        }
    }
}

fn session_error(err: dbus::Error) -> Error {
    Error::Session(format!(
        "{}: {}",
        err.name().unwrap_or("unknown error"),
        err.message().unwrap_or("")
    ))
}

fn close_session(transport: &dyn Transport, path: &Path<'_>) -> Result<()> {
    let msg = method_call(SS_DBUS_NAME, path, SS_SESSION_IFACE, "Close")?;
    transport.call(msg).map_err(session_error)?;
    debug!("closed session {path}");
    Ok(())
}

fn open_session_call(algorithm: &str) -> Result<dbus::Message> {
    method_call(
        SS_DBUS_NAME,
        &Path::from(SS_DBUS_PATH),
        SS_SERVICE_IFACE,
        "OpenSession",
    )
    .map(|msg| msg.append1(algorithm))
}

fn open_plain(transport: &dyn Transport) -> Result<Session> {
    let msg = open_session_call(ALGORITHM_PLAIN)?.append1(Variant(""));
    let reply = transport.call(msg).map_err(session_error)?;
    let (_, path): (Variant<Box<dyn RefArg>>, Path) = reply
        .read2()
        .map_err(|e| Error::Session(format!("malformed OpenSession reply: {e}")))?;
    Ok(Session {
        path: path.into_static(),
        encryption: EncryptionType::Plain,
        key: None,
    })
}

/// Returns `Ok(None)` if the service doesn't do DH.
fn open_dh(transport: &dyn Transport) -> Result<Option<Session>> {
    let keypair = KeyPair::generate().map_err(|e| Error::Session(e.to_string()))?;
    let msg = open_session_call(ALGORITHM_DH)?.append1(Variant(keypair.public_key().to_vec()));
    let reply = match transport.call(msg) {
        Ok(reply) => reply,
        Err(err) if err.name() == Some(ERR_NOT_SUPPORTED) => return Ok(None),
        Err(err) => return Err(session_error(err)),
    };
    let (output, path): (Variant<Vec<u8>>, Path) = reply
        .read2()
        .map_err(|e| Error::Session(format!("malformed OpenSession reply: {e}")))?;
    let key = match keypair.derive_session_key(&output.0) {
        Ok(key) => key,
        Err(e) => {
            // don't leave a half-made session behind on the service
            if let Err(close) = close_session(transport, &path) {
                debug!("could not close rejected session {path}: {close}");
            }
            return Err(Error::Session(format!("key agreement failed: {e}")));
        }
    };
    Ok(Some(Session {
        path: path.into_static(),
        encryption: EncryptionType::Dh,
        key: Some(key),
    }))
}
