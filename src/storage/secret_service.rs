// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::{ExposeSecret as _, SecretVec};
use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

use super::{IsPersistent, Slot, Storage};

/// Credentials kept in the freedesktop.org secret service.
///
/// Each API server owns exactly one item. Writing replaces it and clearing
/// removes every item that matches, including strays left by older writes.
pub(crate) struct SecretService {
    keyring: oo7::Keyring,
    slot: Slot,
    attributes: HashMap<String, String>,
}

impl SecretService {
    pub(crate) async fn new(api_url: &url::Url) -> Result<Self> {
        let slot = Slot::for_server(api_url);
        Ok(Self {
            keyring: oo7::Keyring::new().await.map_err(error::Storage::from)?,
            attributes: slot.attributes(),
            slot,
        })
    }

    fn lookup(&self) -> HashMap<&str, &str> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    async fn items(&self) -> Result<Vec<oo7::Item>> {
        Ok(self
            .keyring
            .search_items(self.lookup())
            .await
            .map_err(error::Storage::from)?)
    }

    async fn remove_all(&self) -> Result<()> {
        for item in self.items().await? {
            item.delete().await.map_err(error::Storage::from)?;
        }
        Ok(())
    }
}

impl IsPersistent for SecretService {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for SecretService {
    async fn get(&mut self) -> Result<Option<T>> {
        let mut items = self.items().await?.into_iter();
        let Some(item) = items.next() else {
            return Ok(None);
        };
        if items.next().is_some() {
            warn!(
                "Found more than one secret service item for {}; using the first",
                self.slot.account()
            );
        }

        let secret = item.secret().await.map_err(error::Storage::from)?;
        Ok(Some(serde_json::from_slice(&secret)?))
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        let secret = SecretVec::new(serde_json::to_vec(data)?);
        self.remove_all().await?;
        self.keyring
            .create_item(&self.slot.label(), self.lookup(), secret.expose_secret(), true)
            .await
            .map_err(error::Storage::from)?;
        debug!("Stored credentials for {} in the secret service", self.slot.account());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        self.remove_all().await?;
        debug!("Removed credentials for {} from the secret service", self.slot.account());
        Ok(())
    }
}
