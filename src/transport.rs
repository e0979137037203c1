/*!

The DBus transport seam.

Everything the library says to the secret service goes through a
[Transport]: method calls are sent as fully built DBus messages and
come back as a reply message or a DBus error, and signals are
delivered through subscriptions. [BusTransport] is the real thing,
backed by a blocking libdbus connection; tests plug in an in-memory
service instead.

*/

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use dbus::Message;
use dbus::blocking::Connection;
use dbus::channel::Token;
use dbus::message::MatchRule;
use log::debug;

use crate::errors::{Error, Result, decode_error};
use crate::settings::BusKind;
use crate::ss::{DBUS_IFACE, DBUS_NAME, DBUS_PATH};

/// A stream of signals matching one match rule.
pub struct Subscription {
    id: usize,
    receiver: Receiver<Message>,
}

impl Subscription {
    pub fn new(id: usize, receiver: Receiver<Message>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Take the next already-delivered signal, if any.
    pub fn try_next(&self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

/// Send method calls and receive signals on a message bus.
///
/// Transports must be `Send` so a connection can be moved to, or shared
/// behind a mutex with, another thread.
pub trait Transport: Send {
    /// Send a method call and wait for its reply. Error replies come
    /// back as `Err` with the DBus error name and message intact.
    fn call(&self, message: Message) -> std::result::Result<Message, dbus::Error>;

    /// Start delivering signals that match `rule`.
    fn subscribe(&self, rule: MatchRule<'static>) -> std::result::Result<Subscription, dbus::Error>;

    /// Block until the subscription has a signal to deliver.
    fn next_signal(&self, subscription: &Subscription) -> std::result::Result<Message, dbus::Error>;

    fn unsubscribe(&self, subscription: Subscription) -> std::result::Result<(), dbus::Error>;
}

/// A [Transport] over a libdbus connection to the session or system bus.
pub struct BusTransport {
    conn: Connection,
    timeout: Duration,
}

impl BusTransport {
    /// Connect to the bus. Fails with [Error::ServiceNotAvailable] if
    /// the bus itself can't be reached.
    pub fn open(bus: BusKind, timeout: Duration) -> Result<Self> {
        let conn = match bus {
            BusKind::Session => Connection::new_session(),
            BusKind::System => Connection::new_system(),
        }
        .map_err(|e| bus_unavailable(bus, e))?;
        debug!("connected to the {bus:?} bus");
        Ok(Self { conn, timeout })
    }
}

impl Transport for BusTransport {
    fn call(&self, message: Message) -> std::result::Result<Message, dbus::Error> {
        self.conn
            .channel()
            .send_with_reply_and_block(message, self.timeout)
    }

    fn subscribe(&self, rule: MatchRule<'static>) -> std::result::Result<Subscription, dbus::Error> {
        let (sender, receiver) = mpsc::channel();
        let token = self.conn.add_match(rule, move |_: (), _, msg: &Message| {
            match msg.duplicate() {
                Ok(copy) => {
                    // the receiver is gone once the subscription is dropped
                    let _ = sender.send(copy);
                }
                Err(e) => debug!("dropped a matched signal that could not be copied: {e}"),
            }
            true
        })?;
        Ok(Subscription::new(token.0, receiver))
    }

    fn next_signal(&self, subscription: &Subscription) -> std::result::Result<Message, dbus::Error> {
        loop {
            if let Some(msg) = subscription.try_next() {
                return Ok(msg);
            }
            self.conn.process(self.timeout)?;
        }
    }

    fn unsubscribe(&self, subscription: Subscription) -> std::result::Result<(), dbus::Error> {
        self.conn.remove_match(Token(subscription.id))
    }
}

fn bus_unavailable(bus: BusKind, err: dbus::Error) -> Error {
    Error::ServiceNotAvailable(format!(
        "can't reach the {bus:?} bus: {}: {}",
        err.name().unwrap_or("unknown error"),
        err.message().unwrap_or("")
    ))
}

/// Build a method call message.
pub(crate) fn method_call(
    destination: &str,
    path: &dbus::Path<'_>,
    interface: &str,
    method: &str,
) -> Result<Message> {
    Message::new_method_call(destination, path.clone(), interface, method).map_err(Error::Protocol)
}

/// Check that `name` is either owned on the bus or activatable.
pub(crate) fn check_name_available(transport: &dyn Transport, name: &str) -> Result<()> {
    let path = dbus::Path::from(DBUS_PATH);
    let msg = method_call(DBUS_NAME, &path, DBUS_IFACE, "NameHasOwner")?.append1(name);
    let reply = transport.call(msg).map_err(decode_error)?;
    let owned: bool = reply.read1().map_err(crate::errors::protocol_error)?;
    if owned {
        return Ok(());
    }
    let msg = method_call(DBUS_NAME, &path, DBUS_IFACE, "ListActivatableNames")?;
    let reply = transport.call(msg).map_err(decode_error)?;
    let names: Vec<String> = reply.read1().map_err(crate::errors::protocol_error)?;
    if names.iter().any(|n| n == name) {
        debug!("{name} is not running but can be activated");
        return Ok(());
    }
    Err(Error::ServiceNotAvailable(format!(
        "{name} is neither running nor activatable"
    )))
}
