/*!

# DBus Secret Service client

This crate talks to the freedesktop.org
[Secret Service](https://specifications.freedesktop.org/secret-service/latest/)
(gnome-keyring, KeePassXC, and friends) over DBus, without linking
to libsecret. It can enumerate, create, lock, unlock and delete
collections, and create, search, read, update and delete the items
in them.

## Sessions and encryption

Each [SecretService] connection negotiates one session with the
service when it connects. By default it asks for the
`dh-ietf1024-sha256-aes128-cbc-pkcs7` algorithm, so secrets cross the
bus AES-encrypted under a key agreed by Diffie-Hellman. If the
service doesn't support that algorithm, the connection falls back to
the `plain` algorithm; you can also ask for `plain` outright with
[EncryptionType::Plain]. Either way, the session's algorithm is fixed
for the life of the connection.

The crypto comes from one of two back ends: enable `crypto-rust`
(the default, pure Rust) or `crypto-openssl`.

## Prompts

Some operations need the user's consent: unlocking, creating a
collection, sometimes deleting. The service answers those with a
prompt that it shows to the user. The plain-named methods
([SecretService::unlock], [Collection::delete], ...) show the prompt
and wait for it; a dismissed prompt fails with
[Error::PromptDismissed]. The `begin_` methods instead hand back a
[PromptOr] so you can decide what to do with the prompt yourself.

## Example

```no_run
use std::collections::HashMap;
use dbus_secret_client::{EncryptionType, SecretService};

let ss = SecretService::connect(EncryptionType::Dh)?;
let collection = ss.get_default_collection()?;
if collection.is_locked()? {
    collection.unlock()?;
}
let item = collection.create_item(
    "demo password",
    HashMap::from([("app", "demo")]),
    b"hunter2",
    true,
    "text/plain",
)?;
assert_eq!(item.get_secret()?, b"hunter2");
# Ok::<(), dbus_secret_client::Error>(())
```

## Headless usage

On a headless box there may be no session bus or no running keyring
daemon. Connecting then fails with [Error::ServiceNotAvailable]. Start
a keyring daemon inside a `dbus-run-session` to get one, e.g.
`echo -n "$pass" | gnome-keyring-daemon --unlock`.

## Usage on Windows Subsystem for Linux

There is no `default` collection under WSL, so
[SecretService::get_default_collection] fails there with
[Error::CollectionNotFound]. Use [SecretService::get_any_collection]
or [SecretService::find_collection_by_label] instead.

 */

pub mod codec;
pub mod collection;
mod crypto;
pub mod errors;
pub mod item;
pub mod prompt;
pub mod service;
pub mod session;
pub mod settings;
mod ss;
pub mod transport;

pub use codec::Secret;
pub use collection::Collection;
pub use dbus::Path;
pub use errors::{Error, Result};
pub use item::Item;
pub use prompt::{Prompt, PromptOr, PromptOutcome};
pub use service::{SearchItemsResult, SecretService};
pub use session::{EncryptionType, Session};
pub use settings::{BusKind, Settings};
pub use transport::{BusTransport, Subscription, Transport};

#[cfg(test)]
mod tests;
