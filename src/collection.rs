/*!

Collections.

A collection is a named store of items. Its lock state lives on the
service: check it with [Collection::is_locked] whenever it matters,
and re-check it after any lock or unlock.

*/

use std::collections::HashMap;

use dbus::Path;
use dbus::arg::{PropMap, RefArg, Variant};

use crate::errors::{Error, Result, decode_collection_error, protocol_error};
use crate::item::Item;
use crate::prompt::{Prompt, PromptOr};
use crate::service::SecretService;
use crate::ss::{SS_COLLECTION_IFACE, SS_ITEM_ATTRIBUTES, SS_ITEM_LABEL};

#[derive(Debug, Clone)]
pub struct Collection<'a> {
    service: &'a SecretService,
    path: Path<'static>,
}

impl<'a> Collection<'a> {
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
            .get_property(&self.path, SS_COLLECTION_IFACE, name, decode_collection_error)
    }

    pub fn is_locked(&self) -> Result<bool> {
        self.get("Locked")
    }

    /// Fail with [Error::Locked] unless the collection is unlocked.
    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked()? {
            Err(Error::Locked(self.path.to_string()))
        } else {
            Ok(())
        }
    }

    /// Unlock the collection, prompting if the service wants to.
    pub fn unlock(&self) -> Result<()> {
        self.service.unlock(&[&self.path])?;
        Ok(())
    }

    pub fn lock(&self) -> Result<()> {
        self.service.lock(&[&self.path])?;
        Ok(())
    }

    pub fn get_all_items(&self) -> Result<Vec<Item<'a>>> {
        let paths = self.service.get_paths_property(
            &self.path,
            SS_COLLECTION_IFACE,
            "Items",
            decode_collection_error,
        )?;
        Ok(paths
            .into_iter()
            .map(|p| Item::new(self.service, p))
            .collect())
    }

    /// Search this collection for items with all of the given attributes.
    pub fn search_items(&self, attributes: HashMap<&str, &str>) -> Result<Vec<Item<'a>>> {
        let msg = self
            .service
            .new_call(&self.path, SS_COLLECTION_IFACE, "SearchItems")?
            .append1(attributes);
        let reply = self.service.call(msg, decode_collection_error)?;
        let paths: Vec<Path> = reply.read1().map_err(protocol_error)?;
        Ok(self.service.items_at(paths))
    }

    pub fn get_label(&self) -> Result<String> {
        self.get("Label")
    }

    pub fn set_label(&self, label: &str) -> Result<()> {
        self.service.set_property(
            &self.path,
            SS_COLLECTION_IFACE,
            "Label",
            label,
            decode_collection_error,
        )
    }

    /// Creation time, in seconds since the epoch.
    pub fn created(&self) -> Result<u64> {
        self.get("Created")
    }

    /// Last modification time, in seconds since the epoch.
    pub fn modified(&self) -> Result<u64> {
        self.get("Modified")
    }

    /// Ask for a new item in this collection. With `replace`, an item
    /// with exactly these attributes is overwritten instead.
    pub fn begin_create_item(
        &self,
        label: &str,
        attributes: HashMap<&str, &str>,
        secret: &[u8],
        replace: bool,
        content_type: &str,
    ) -> Result<PromptOr<'a, Item<'a>>> {
        let attributes: HashMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut properties = PropMap::new();
        properties.insert(
            SS_ITEM_LABEL.to_string(),
            Variant(Box::new(label.to_string()) as Box<dyn RefArg>),
        );
        properties.insert(
            SS_ITEM_ATTRIBUTES.to_string(),
            Variant(Box::new(attributes) as Box<dyn RefArg>),
        );
        let secret = self.service.encode_secret(secret, content_type)?;
        let msg = self
            .service
            .new_call(&self.path, SS_COLLECTION_IFACE, "CreateItem")?
            .append3(properties, secret.into_wire(), replace);
        let reply = self.service.call(msg, decode_collection_error)?;
        let (item, prompt): (Path, Path) = reply.read2().map_err(protocol_error)?;
        match Prompt::from_path(self.service, prompt) {
            Some(prompt) => Ok(PromptOr::NeedsPrompt(prompt)),
            None => Ok(PromptOr::Direct(Item::new(self.service, item.into_static()))),
        }
    }

    /// Create an item, prompting if need be.
    pub fn create_item(
        &self,
        label: &str,
        attributes: HashMap<&str, &str>,
        secret: &[u8],
        replace: bool,
        content_type: &str,
    ) -> Result<Item<'a>> {
        match self.begin_create_item(label, attributes, secret, replace, content_type)? {
            PromptOr::Direct(item) => Ok(item),
            PromptOr::NeedsPrompt(prompt) => {
                let path = prompt.complete()?.into_result()?.into_iter().next().ok_or_else(|| {
                    Error::Protocol("item prompt returned no item".to_string())
                })?;
                Ok(Item::new(self.service, path))
            }
        }
    }

    pub fn begin_delete(&self) -> Result<PromptOr<'a, ()>> {
        let msg = self
            .service
            .new_call(&self.path, SS_COLLECTION_IFACE, "Delete")?;
        let reply = self.service.call(msg, decode_collection_error)?;
        let prompt: Path = reply.read1().map_err(protocol_error)?;
        Ok(match Prompt::from_path(self.service, prompt) {
            Some(prompt) => PromptOr::NeedsPrompt(prompt),
            None => PromptOr::Direct(()),
        })
    }

    /// Delete the collection and everything in it, prompting if need be.
    /// The handle is stale afterwards.
    pub fn delete(&self) -> Result<()> {
        if let PromptOr::NeedsPrompt(prompt) = self.begin_delete()? {
            prompt.complete()?.into_result()?;
        }
        Ok(())
    }
}
