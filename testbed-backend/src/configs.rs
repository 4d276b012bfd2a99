//! Named job configurations persisted by id with a by-name pointer.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use testbed_store::Store;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// A stored configuration together with its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry<C> {
    pub uuid: Uuid,
    pub config: C,
}

/// How to address a stored configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLookup<'a> {
    Name(&'a str),
    Id(Uuid),
}

impl From<Uuid> for ConfigLookup<'_> {
    fn from(uuid: Uuid) -> Self {
        Self::Id(uuid)
    }
}

impl<'a> From<&'a str> for ConfigLookup<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

pub(crate) struct ConfigRegistry<C> {
    store: Store,
    by_id: &'static str,
    by_name: &'static str,
    _config: PhantomData<fn() -> C>,
}

impl<C> ConfigRegistry<C>
where
    C: Serialize + DeserializeOwned,
{
    pub(crate) fn new(store: Store, by_id: &'static str, by_name: &'static str) -> Self {
        Self {
            store,
            by_id,
            by_name,
            _config: PhantomData,
        }
    }

    /// Store `config` under `name`, or return the id already registered for it.
    ///
    /// The existence check and both writes happen under one transaction, so
    /// concurrent creates of the same name agree on a single id.
    pub(crate) async fn create(&self, name: &str, config: &C) -> Result<Uuid, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::validation("config name can't be empty"));
        }

        let mut tx = self.store.transaction().await;
        if let Some(ptr) = tx.get(Some(self.by_name), name).await? {
            debug!(ns = self.by_name, name, "config already exists");
            return parse_pointer(name, &ptr);
        }

        let uuid = Uuid::new_v4();
        tx.put(
            Some(self.by_id),
            &uuid.to_string(),
            &ConfigEntry { uuid, config },
        )
        .await?;
        tx.put_raw(Some(self.by_name), name, &uuid.to_string())
            .await?;
        info!(ns = self.by_id, %uuid, name, "config created");
        Ok(uuid)
    }

    pub(crate) async fn list(&self) -> Result<Vec<ConfigEntry<C>>, ServerError> {
        let entries = self
            .store
            .entries::<ConfigEntry<C>>(Some(self.by_id), None)
            .await?;
        Ok(entries.into_values().collect())
    }

    pub(crate) async fn get(&self, lookup: ConfigLookup<'_>) -> Result<ConfigEntry<C>, ServerError> {
        let uuid = match lookup {
            ConfigLookup::Id(uuid) => uuid,
            ConfigLookup::Name(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ServerError::validation("config name can't be empty"));
                }
                let ptr = self
                    .store
                    .get(Some(self.by_name), name)
                    .await?
                    .ok_or_else(|| ServerError::not_found(format!("config '{name}'")))?;
                parse_pointer(name, &ptr)?
            }
        };

        self.store
            .get_record(Some(self.by_id), &uuid.to_string())
            .await?
            .ok_or_else(|| ServerError::not_found(format!("config {uuid}")))
    }
}

fn parse_pointer(name: &str, ptr: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(ptr.trim())
        .map_err(|e| ServerError::Unexpected(format!("bad id for config '{name}': {e}")))
}
