// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret as _, SecretVec};
use security_framework::{
    base,
    os::macos::{
        keychain::{SecKeychain, SecPreferencesDomain},
        keychain_item::SecKeychainItem,
    },
};
use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

use super::{IsPersistent, Slot, Storage};

// errSecItemNotFound
const ITEM_NOT_FOUND: i32 = -25300_i32;

/// Credentials kept as a generic password in the user's login keychain.
///
/// The service is shared by the whole client and the account is the API
/// server, so each server owns one item and writing updates it in place.
pub(crate) struct Keychain {
    delegate: SecKeychain,
    slot: Slot,
}

impl Keychain {
    pub(crate) fn new(api_url: &url::Url) -> Result<Self> {
        Ok(Self {
            delegate: SecKeychain::default_for_domain(SecPreferencesDomain::User)
                .map_err(error::Storage::from)?,
            slot: Slot::for_server(api_url),
        })
    }

    fn find(&self) -> Result<Option<(Vec<u8>, SecKeychainItem)>> {
        match self
            .delegate
            .find_generic_password(&self.slot.service(), self.slot.account())
        {
            Ok((password, item)) => Ok(Some((password.to_vec(), item))),
            Err(err) => not_found(err).map(|()| None),
        }
    }
}

fn not_found(err: base::Error) -> Result<()> {
    if err.code() == ITEM_NOT_FOUND {
        Ok(())
    } else {
        Err(error::Storage::from(err).into())
    }
}

impl IsPersistent for Keychain {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for Keychain {
    async fn get(&mut self) -> Result<Option<T>> {
        match self.find()? {
            Some((password, _)) => Ok(Some(serde_json::from_slice(&password)?)),
            None => Ok(None),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        self.delegate
            .set_generic_password(
                &self.slot.service(),
                self.slot.account(),
                SecretVec::new(serde_json::to_vec(data)?).expose_secret(),
            )
            .map_err(error::Storage::from)?;
        debug!("Stored credentials for {} in Keychain", self.slot.account());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some((_, item)) = self.find()? {
            item.delete();
        }
        debug!("Removed credentials for {} from Keychain", self.slot.account());
        Ok(())
    }
}
