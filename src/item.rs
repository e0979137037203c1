/*!

Items.

An item is one secret plus its label and lookup attributes. The
secret itself is only fetched when asked for, and travels encoded
under the connection's session in both directions.

*/

use std::collections::HashMap;

use dbus::Path;

use crate::codec::Secret;
use crate::errors::{Error, Result, decode_error, protocol_error};
use crate::prompt::{Prompt, PromptOr};
use crate::service::SecretService;
use crate::ss::SS_ITEM_IFACE;

#[derive(Debug, Clone)]
pub struct Item<'a> {
    service: &'a SecretService,
    path: Path<'static>,
}

impl<'a> Item<'a> {
    pub fn new(service: &'a SecretService, path: Path<'static>) -> Self {
        Self { service, path }
    }

    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    fn get<T>(&self, name: &str) -> Result<T>
    where
        T: dbus::arg::Arg + for<'b> dbus::arg::Get<'b>,
    {
        self.service
            .get_property(&self.path, SS_ITEM_IFACE, name, decode_error)
    }

    pub fn is_locked(&self) -> Result<bool> {
        self.get("Locked")
    }

    /// Fail with [Error::Locked] unless the item is unlocked.
    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked()? {
            Err(Error::Locked(self.path.to_string()))
        } else {
            Ok(())
        }
    }

    /// Unlock the item, prompting if the service wants to.
    pub fn unlock(&self) -> Result<()> {
        self.service.unlock(&[&self.path])?;
        Ok(())
    }

    pub fn get_attributes(&self) -> Result<HashMap<String, String>> {
        self.get("Attributes")
    }

    /// Replace the item's attributes.
    pub fn set_attributes(&self, attributes: HashMap<&str, &str>) -> Result<()> {
        self.service
            .set_property(&self.path, SS_ITEM_IFACE, "Attributes", attributes, decode_error)
    }

    pub fn get_label(&self) -> Result<String> {
        self.get("Label")
    }

    pub fn set_label(&self, label: &str) -> Result<()> {
        self.service
            .set_property(&self.path, SS_ITEM_IFACE, "Label", label, decode_error)
    }

    /// Creation time, in seconds since the epoch.
    pub fn created(&self) -> Result<u64> {
        self.get("Created")
    }

    /// Last modification time, in seconds since the epoch.
    pub fn modified(&self) -> Result<u64> {
        self.get("Modified")
    }

    fn fetch_secret(&self) -> Result<Secret> {
        let msg = self
            .service
            .new_call(&self.path, SS_ITEM_IFACE, "GetSecret")?
            .append1(self.service.session().path().clone());
        let reply = self.service.call(msg, decode_error)?;
        let wire: (Path, Vec<u8>, Vec<u8>, String) = reply.read1().map_err(protocol_error)?;
        Ok(Secret::from_wire(wire))
    }

    /// Fetch and decode the secret. Fails with [Error::Locked] if the
    /// item is locked.
    pub fn get_secret(&self) -> Result<Vec<u8>> {
        let secret = self.fetch_secret()?;
        self.service.decode_secret(&secret)
    }

    pub fn get_secret_content_type(&self) -> Result<String> {
        Ok(self.fetch_secret()?.content_type)
    }

    pub fn set_secret(&self, secret: &[u8], content_type: &str) -> Result<()> {
        let secret = self.service.encode_secret(secret, content_type)?;
        let msg = self
            .service
            .new_call(&self.path, SS_ITEM_IFACE, "SetSecret")?
            .append1(secret.into_wire());
        self.service.call(msg, decode_error)?;
        Ok(())
    }

    pub fn begin_delete(&self) -> Result<PromptOr<'a, ()>> {
        let msg = self
            .service
            .new_call(&self.path, SS_ITEM_IFACE, "Delete")?;
        let reply = self.service.call(msg, decode_error)?;
        let prompt: Path = reply.read1().map_err(protocol_error)?;
        Ok(match Prompt::from_path(self.service, prompt) {
            Some(prompt) => PromptOr::NeedsPrompt(prompt),
            None => PromptOr::Direct(()),
        })
    }

    /// Delete the item, prompting if need be. The handle is stale
    /// afterwards.
    pub fn delete(&self) -> Result<()> {
        if let PromptOr::NeedsPrompt(prompt) = self.begin_delete()? {
            prompt.complete()?.into_result()?;
        }
        Ok(())
    }
}
