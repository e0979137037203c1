/*!

The `Secret` wire structure and its encoding under a session.

On the wire a secret is the struct `(oayays)`: the session path, the
algorithm parameters (the IV for DH sessions, empty for plain ones),
the value (ciphertext or plaintext) and a content type.

*/

use dbus::Path;

use crate::crypto;
use crate::errors::{Error, Result};
use crate::session::Session;

/// The DBus representation of a [Secret].
pub(crate) type WireSecret = (Path<'static>, Vec<u8>, Vec<u8>, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub session: Path<'static>,
    pub parameters: Vec<u8>,
    pub value: Vec<u8>,
    pub content_type: String,
}

impl Secret {
    pub(crate) fn into_wire(self) -> WireSecret {
        (self.session, self.parameters, self.value, self.content_type)
    }

    pub(crate) fn from_wire(wire: (Path<'_>, Vec<u8>, Vec<u8>, String)) -> Self {
        let (session, parameters, value, content_type) = wire;
        Secret {
            session: session.into_static(),
            parameters,
            value,
            content_type,
        }
    }
}

/// Encode `plaintext` for transmission under `session`.
pub fn encrypt(plaintext: &[u8], session: &Session, content_type: &str) -> Result<Secret> {
    let (parameters, value) = match session.key() {
        None => (Vec::new(), plaintext.to_vec()),
        Some(key) => {
            let iv = crypto::random_iv().map_err(|e| Error::Session(e.to_string()))?;
            let ciphertext = crypto::encrypt(key, &iv, plaintext)
                .map_err(|e| Error::Session(format!("encryption failed: {e}")))?;
            (iv.to_vec(), ciphertext)
        }
    };
    Ok(Secret {
        session: session.path().clone(),
        parameters,
        value,
        content_type: content_type.to_string(),
    })
}

/// Recover the plaintext of a secret that was encoded under `session`.
///
/// A secret stamped with some other session is rejected outright,
/// as is one whose padding doesn't check out.
pub fn decrypt(secret: &Secret, session: &Session) -> Result<Vec<u8>> {
    if &secret.session != session.path() {
        return Err(Error::Decryption(format!(
            "secret belongs to session {}, not {}",
            secret.session,
            session.path()
        )));
    }
    match session.key() {
        None => Ok(secret.value.clone()),
        Some(key) => crypto::decrypt(key, &secret.parameters, &secret.value)
            .map(|mut plaintext| std::mem::take(&mut *plaintext))
            .map_err(|e| Error::Decryption(e.to_string())),
    }
}
