/*!

Error taxonomy for secret-service access.

Every failure the service reports over DBus is translated here into
one of the library's error kinds, keeping the original DBus error name
and message around whenever the kind doesn't already say everything.

*/

use crate::ss::{
    ERR_IS_LOCKED, ERR_NAME_HAS_NO_OWNER, ERR_NO_SESSION, ERR_NO_SUCH_OBJECT, ERR_SERVICE_UNKNOWN,
    ERR_UNKNOWN_OBJECT,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No secret service is running or activatable on the bus.
    #[error("The secret service is not available: {0}")]
    ServiceNotAvailable(String),
    /// The session handshake with the service failed.
    #[error("Could not open a session with the secret service: {0}")]
    Session(String),
    /// A secret could not be decrypted with this connection's session.
    #[error("Could not decrypt secret: {0}")]
    Decryption(String),
    /// The target object must be unlocked first.
    #[error("The object {0} is locked")]
    Locked(String),
    #[error("No such item: {0}")]
    ItemNotFound(String),
    #[error("No such collection: {0}")]
    CollectionNotFound(String),
    /// The user dismissed the prompt.
    #[error("The prompt was dismissed")]
    PromptDismissed,
    /// A completion is already waiting on this prompt path.
    #[error("The prompt {0} is already being completed")]
    PromptInFlight(String),
    #[error("DBus failure {name}: {message}")]
    Communication { name: String, message: String },
    /// The service replied with arguments of an unexpected shape.
    #[error("Unexpected reply from the secret service: {0}")]
    Protocol(String),
    #[error("Invalid value for '{0}': {1}")]
    Invalid(String, String),
}

impl Error {
    /// The DBus error name behind this error, if it came from the bus.
    pub fn dbus_name(&self) -> Option<&str> {
        match self {
            Error::Communication { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Translate a DBus error into the matching library error.
pub(crate) fn decode_error(err: dbus::Error) -> Error {
    let name = err.name().unwrap_or("").to_string();
    let message = err.message().unwrap_or("").to_string();
    match name.as_str() {
        ERR_NO_SUCH_OBJECT | ERR_UNKNOWN_OBJECT => Error::ItemNotFound(message),
        ERR_IS_LOCKED => Error::Locked(message),
        ERR_NO_SESSION => Error::Session(message),
        ERR_SERVICE_UNKNOWN | ERR_NAME_HAS_NO_OWNER => Error::ServiceNotAvailable(message),
        _ => Error::Communication { name, message },
    }
}

/// Like [decode_error], but for calls made on a collection: missing
/// objects are reported as missing collections.
pub(crate) fn decode_collection_error(err: dbus::Error) -> Error {
    match decode_error(err) {
        Error::ItemNotFound(message) => Error::CollectionNotFound(message),
        other => other,
    }
}

pub(crate) fn protocol_error(err: impl std::fmt::Display) -> Error {
    Error::Protocol(err.to_string())
}
