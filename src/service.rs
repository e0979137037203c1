/*!

The secret service connection.

A [SecretService] is one connection to the service: a transport, the
session negotiated over it, and the table of prompts it is waiting
on. Collections and items borrow the connection they were found on
and never cache remote state, so every property read goes back to
the service.

*/

use std::collections::HashMap;
use std::fmt;

use dbus::Message;
use dbus::Path;
use dbus::arg::{Append, Arg, Get, PropMap, RefArg, Variant};
use log::debug;

use crate::codec::{self, Secret};
use crate::collection::Collection;
use crate::errors::{Error, Result, decode_error, protocol_error};
use crate::item::Item;
use crate::prompt::{Prompt, PromptCompletor, PromptOr};
use crate::session::{EncryptionType, Session};
use crate::settings::Settings;
use crate::ss::{
    ALIAS_DEFAULT, ALIAS_SESSION, NO_OBJECT, PROPERTIES_IFACE, SS_COLLECTION_LABEL,
    SS_DBUS_NAME, SS_DBUS_PATH, SS_SERVICE_IFACE,
};
use crate::transport::{BusTransport, Transport, check_name_available, method_call};

/// Items found by a service-wide search, split by lock state.
#[derive(Debug)]
pub struct SearchItemsResult<'a> {
    pub unlocked: Vec<Item<'a>>,
    pub locked: Vec<Item<'a>>,
}

pub struct SecretService {
    transport: Box<dyn Transport>,
    session: Session,
    settings: Settings,
    prompts: PromptCompletor,
}

impl fmt::Debug for SecretService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretService")
            .field("session", &self.session)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SecretService {
    /// Connect to the secret service on the session bus.
    pub fn connect(encryption: EncryptionType) -> Result<Self> {
        Self::connect_with_settings(Settings::new(encryption))
    }

    pub fn connect_with_settings(settings: Settings) -> Result<Self> {
        let transport = BusTransport::open(settings.bus, settings.timeout)?;
        Self::connect_with(Box::new(transport), settings)
    }

    /// Connect over the given transport.
    ///
    /// Fails with [Error::ServiceNotAvailable] if nobody owns (or can
    /// be activated for) the secret service name, and with
    /// [Error::Session] if the session handshake fails.
    pub fn connect_with(transport: Box<dyn Transport>, settings: Settings) -> Result<Self> {
        check_name_available(transport.as_ref(), SS_DBUS_NAME)?;
        let session = Session::open(transport.as_ref(), settings.encryption)?;
        Ok(Self {
            transport,
            session,
            settings,
            prompts: PromptCompletor::new(),
        })
    }

    /// Close the session and drop the connection.
    pub fn disconnect(self) -> Result<()> {
        self.session.close(self.transport.as_ref())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn prompts(&self) -> &PromptCompletor {
        &self.prompts
    }

    pub(crate) fn new_call(&self, path: &Path<'_>, interface: &str, method: &str) -> Result<Message> {
        method_call(SS_DBUS_NAME, path, interface, method)
    }

    pub(crate) fn call(&self, msg: Message, decode: fn(dbus::Error) -> Error) -> Result<Message> {
        self.transport.call(msg).map_err(decode)
    }

    pub(crate) fn get_property<T>(
        &self,
        path: &Path<'_>,
        interface: &str,
        name: &str,
        decode: fn(dbus::Error) -> Error,
    ) -> Result<T>
    where
        T: Arg + for<'b> Get<'b>,
    {
        let msg = self.new_call(path, PROPERTIES_IFACE, "Get")?.append2(interface, name);
        let reply = self.call(msg, decode)?;
        let value: Variant<T> = reply.read1().map_err(protocol_error)?;
        Ok(value.0)
    }

    pub(crate) fn get_paths_property(
        &self,
        path: &Path<'_>,
        interface: &str,
        name: &str,
        decode: fn(dbus::Error) -> Error,
    ) -> Result<Vec<Path<'static>>> {
        let msg = self.new_call(path, PROPERTIES_IFACE, "Get")?.append2(interface, name);
        let reply = self.call(msg, decode)?;
        let value: Variant<Vec<Path>> = reply.read1().map_err(protocol_error)?;
        Ok(value.0.into_iter().map(Path::into_static).collect())
    }

    pub(crate) fn set_property<T>(
        &self,
        path: &Path<'_>,
        interface: &str,
        name: &str,
        value: T,
        decode: fn(dbus::Error) -> Error,
    ) -> Result<()>
    where
        T: Arg + Append,
    {
        let msg = self
            .new_call(path, PROPERTIES_IFACE, "Set")?
            .append3(interface, name, Variant(value));
        self.call(msg, decode)?;
        Ok(())
    }

    /// Encode a secret for sending on this connection.
    pub(crate) fn encode_secret(&self, secret: &[u8], content_type: &str) -> Result<Secret> {
        codec::encrypt(secret, &self.session, content_type)
    }

    /// Decode a secret received on this connection.
    pub(crate) fn decode_secret(&self, secret: &Secret) -> Result<Vec<u8>> {
        codec::decrypt(secret, &self.session)
    }

    fn service_path() -> Path<'static> {
        Path::from(SS_DBUS_PATH)
    }

    pub fn get_all_collections(&self) -> Result<Vec<Collection<'_>>> {
        let paths = self.get_paths_property(
            &Self::service_path(),
            SS_SERVICE_IFACE,
            "Collections",
            decode_error,
        )?;
        Ok(paths.into_iter().map(|p| Collection::new(self, p)).collect())
    }

    /// The collection an alias points at, if any.
    pub fn read_alias(&self, alias: &str) -> Result<Option<Collection<'_>>> {
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, "ReadAlias")?
            .append1(alias);
        let reply = self.call(msg, decode_error)?;
        let path: Path = reply.read1().map_err(protocol_error)?;
        if &*path == NO_OBJECT {
            Ok(None)
        } else {
            Ok(Some(Collection::new(self, path.into_static())))
        }
    }

    /// Point `alias` at `collection`, or remove it if `collection` is `None`.
    pub fn set_alias(&self, alias: &str, collection: Option<&Collection<'_>>) -> Result<()> {
        let target = match collection {
            Some(c) => c.path().clone(),
            None => Path::from(NO_OBJECT),
        };
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, "SetAlias")?
            .append2(alias, target);
        self.call(msg, decode_error)?;
        Ok(())
    }

    pub fn get_collection_by_alias(&self, alias: &str) -> Result<Collection<'_>> {
        self.read_alias(alias)?
            .ok_or_else(|| Error::CollectionNotFound(format!("no collection has alias '{alias}'")))
    }

    pub fn get_default_collection(&self) -> Result<Collection<'_>> {
        self.get_collection_by_alias(ALIAS_DEFAULT)
    }

    /// The default collection, else the session collection, else
    /// whichever collection the service lists first.
    pub fn get_any_collection(&self) -> Result<Collection<'_>> {
        for alias in [ALIAS_DEFAULT, ALIAS_SESSION] {
            if let Some(collection) = self.read_alias(alias)? {
                return Ok(collection);
            }
        }
        self.get_all_collections()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::CollectionNotFound("the service has no collections".to_string()))
    }

    /// Find the collection whose label is `label`.
    pub fn find_collection_by_label(&self, label: &str) -> Result<Collection<'_>> {
        for collection in self.get_all_collections()? {
            if collection.get_label()? == label {
                return Ok(collection);
            }
        }
        Err(Error::CollectionNotFound(format!(
            "no collection is labeled '{label}'"
        )))
    }

    /// Ask for a new collection; the service may want to prompt first.
    pub fn begin_create_collection(
        &self,
        label: &str,
        alias: &str,
    ) -> Result<PromptOr<'_, Collection<'_>>> {
        let mut properties = PropMap::new();
        properties.insert(
            SS_COLLECTION_LABEL.to_string(),
            Variant(Box::new(label.to_string()) as Box<dyn RefArg>),
        );
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, "CreateCollection")?
            .append2(properties, alias);
        let reply = self.call(msg, decode_error)?;
        let (collection, prompt): (Path, Path) = reply.read2().map_err(protocol_error)?;
        match Prompt::from_path(self, prompt) {
            Some(prompt) => Ok(PromptOr::NeedsPrompt(prompt)),
            None => Ok(PromptOr::Direct(Collection::new(self, collection.into_static()))),
        }
    }

    /// Create a collection labeled `label`, prompting if need be.
    /// An empty `alias` creates the collection without one.
    pub fn create_collection(&self, label: &str, alias: &str) -> Result<Collection<'_>> {
        match self.begin_create_collection(label, alias)? {
            PromptOr::Direct(collection) => Ok(collection),
            PromptOr::NeedsPrompt(prompt) => {
                let path = prompt.complete()?.into_result()?.into_iter().next().ok_or_else(|| {
                    Error::Protocol("collection prompt returned no collection".to_string())
                })?;
                Ok(Collection::new(self, path))
            }
        }
    }

    /// Search all collections for items with all of the given attributes.
    pub fn search_items(&self, attributes: HashMap<&str, &str>) -> Result<SearchItemsResult<'_>> {
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, "SearchItems")?
            .append1(attributes);
        let reply = self.call(msg, decode_error)?;
        let (unlocked, locked): (Vec<Path>, Vec<Path>) = reply.read2().map_err(protocol_error)?;
        Ok(SearchItemsResult {
            unlocked: self.items_at(unlocked),
            locked: self.items_at(locked),
        })
    }

    pub(crate) fn items_at(&self, paths: Vec<Path<'_>>) -> Vec<Item<'_>> {
        paths
            .into_iter()
            .map(|p| Item::new(self, p.into_static()))
            .collect()
    }

    fn lock_action(
        &self,
        method: &str,
        paths: &[&Path<'_>],
    ) -> Result<(Vec<Path<'static>>, Option<Prompt<'_>>)> {
        let objects: Vec<Path> = paths.iter().map(|p| (*p).clone()).collect();
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, method)?
            .append1(objects);
        let reply = self.call(msg, decode_error)?;
        let (done, prompt): (Vec<Path>, Path) = reply.read2().map_err(protocol_error)?;
        let done = done.into_iter().map(Path::into_static).collect();
        Ok((done, Prompt::from_path(self, prompt)))
    }

    fn complete_lock_action(
        &self,
        method: &str,
        paths: &[&Path<'_>],
    ) -> Result<Vec<Path<'static>>> {
        let (mut done, prompt) = self.lock_action(method, paths)?;
        if let Some(prompt) = prompt {
            debug!("{method} of {} objects needs a prompt", paths.len());
            for path in prompt.complete()?.into_result()? {
                if !done.contains(&path) {
                    done.push(path);
                }
            }
        }
        Ok(done)
    }

    /// Ask to unlock objects. A direct answer lists the objects that
    /// were unlocked without prompting.
    pub fn begin_unlock(&self, paths: &[&Path<'_>]) -> Result<PromptOr<'_, Vec<Path<'static>>>> {
        let (done, prompt) = self.lock_action("Unlock", paths)?;
        Ok(match prompt {
            Some(prompt) => PromptOr::NeedsPrompt(prompt),
            None => PromptOr::Direct(done),
        })
    }

    /// Unlock objects, prompting if need be. Returns the unlocked paths.
    pub fn unlock(&self, paths: &[&Path<'_>]) -> Result<Vec<Path<'static>>> {
        self.complete_lock_action("Unlock", paths)
    }

    pub fn begin_lock(&self, paths: &[&Path<'_>]) -> Result<PromptOr<'_, Vec<Path<'static>>>> {
        let (done, prompt) = self.lock_action("Lock", paths)?;
        Ok(match prompt {
            Some(prompt) => PromptOr::NeedsPrompt(prompt),
            None => PromptOr::Direct(done),
        })
    }

    /// Lock objects, prompting if need be. Returns the locked paths.
    pub fn lock(&self, paths: &[&Path<'_>]) -> Result<Vec<Path<'static>>> {
        self.complete_lock_action("Lock", paths)
    }

    pub fn unlock_all(&self, items: &[&Item<'_>]) -> Result<Vec<Path<'static>>> {
        let paths: Vec<&Path> = items.iter().map(|i| i.path()).collect();
        self.unlock(&paths)
    }

    pub fn lock_all(&self, items: &[&Item<'_>]) -> Result<Vec<Path<'static>>> {
        let paths: Vec<&Path> = items.iter().map(|i| i.path()).collect();
        self.lock(&paths)
    }

    /// Fetch the secrets of several items in one call. Locked items
    /// are left out of the result.
    pub fn get_secrets(&self, items: &[&Item<'_>]) -> Result<HashMap<Path<'static>, Vec<u8>>> {
        let objects: Vec<Path> = items.iter().map(|i| i.path().clone()).collect();
        let msg = self
            .new_call(&Self::service_path(), SS_SERVICE_IFACE, "GetSecrets")?
            .append2(objects, self.session.path().clone());
        let reply = self.call(msg, decode_error)?;
        let secrets: HashMap<Path, (Path, Vec<u8>, Vec<u8>, String)> =
            reply.read1().map_err(protocol_error)?;
        let mut result = HashMap::with_capacity(secrets.len());
        for (path, wire) in secrets {
            let secret = Secret::from_wire(wire);
            result.insert(path.into_static(), self.decode_secret(&secret)?);
        }
        Ok(result)
    }
}
