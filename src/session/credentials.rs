// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use futures_util::lock::Mutex;
use log::{debug, warn};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    error::Result,
    model,
    storage::Storage,
};

/// The access and refresh tokens issued at login.
#[derive(Clone)]
pub(crate) struct CredentialPair {
    access_token: SecretString,
    refresh_token: SecretString,
}

impl CredentialPair {
    pub(crate) const fn new(access_token: SecretString, refresh_token: SecretString) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    pub(crate) const fn access_token(&self) -> &SecretString {
        &self.access_token
    }
}

impl From<model::TokenPair> for CredentialPair {
    fn from(value: model::TokenPair) -> Self {
        Self::new(value.access, value.refresh)
    }
}

/// The persisted form of a [`CredentialPair`].
///
/// Either field may be missing from what we read back, in which case there
/// is no usable pair.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct Record {
    #[serde(default, serialize_with = "serialize_token")]
    token: Option<SecretString>,
    #[serde(
        rename = "refreshToken",
        default,
        serialize_with = "serialize_token"
    )]
    refresh_token: Option<SecretString>,
}

impl Record {
    fn into_pair(self) -> Option<CredentialPair> {
        match (self.token, self.refresh_token) {
            (Some(access_token), Some(refresh_token)) => {
                Some(CredentialPair::new(access_token, refresh_token))
            }
            (_, _) => None,
        }
    }
}

impl From<&CredentialPair> for Record {
    fn from(value: &CredentialPair) -> Self {
        Self {
            token: Some(value.access_token.clone()),
            refresh_token: Some(value.refresh_token.clone()),
        }
    }
}

fn serialize_token<S: Serializer>(
    value: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value.as_ref() {
        Some(token) => serializer.serialize_some(token.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Durable slot for the session's token pair.
pub(crate) struct Credentials<S> {
    storage: Mutex<S>,
    persistent: bool,
}

impl<S: Storage<Record>> Credentials<S> {
    pub(crate) fn new(storage: S) -> Self {
        let persistent = storage.is_persistent();
        Self {
            storage: Mutex::new(storage),
            persistent,
        }
    }

    /// Whether saved credentials outlive this process.
    pub(crate) const fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub(crate) async fn save(&self, pair: &CredentialPair) -> Result<()> {
        let mut storage = self.storage.lock().await;
        storage.update(&Record::from(pair)).await
    }

    /// The stored pair, if there is a complete one.
    ///
    /// Stored data we cannot read is treated as though nothing was stored.
    pub(crate) async fn load(&self) -> Option<CredentialPair> {
        let mut storage = self.storage.lock().await;
        match storage.get().await {
            Ok(Some(record)) => {
                let pair = record.into_pair();
                if pair.is_none() {
                    debug!("Stored credentials are incomplete, so we will ignore them");
                }
                pair
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Failed to decode stored credentials, so we have to start over: {}",
                    e
                );
                None
            }
        }
    }

    pub(crate) async fn clear(&self) -> Result<()> {
        let mut storage = self.storage.lock().await;
        storage.clear().await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_test::{assert_ser_tokens, Token};

    use crate::storage;

    use super::*;

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair::new(
            SecretString::new(access.to_owned()),
            SecretString::new(refresh.to_owned()),
        )
    }

    #[test]
    fn persisted_layout() {
        assert_ser_tokens(
            &Record::from(&pair("A", "R")),
            &[
                Token::Struct {
                    name: "Record",
                    len: 2,
                },
                Token::Str("token"),
                Token::Some,
                Token::Str("A"),
                Token::Str("refreshToken"),
                Token::Some,
                Token::Str("R"),
                Token::StructEnd,
            ],
        );
    }

    #[tokio::test]
    async fn save_load_clear() -> Result<()> {
        let credentials = Credentials::new(storage::Memory::<Record>::new());
        assert!(credentials.load().await.is_none());
        assert!(!credentials.is_persistent());

        credentials.save(&pair("A", "R")).await?;
        let loaded = credentials.load().await;
        assert_eq!(
            loaded.as_ref().map(|p| p.access_token().expose_secret().as_str()),
            Some("A")
        );

        credentials.clear().await?;
        credentials.clear().await?;
        assert!(credentials.load().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn incomplete_record_loads_as_absent() {
        let credentials = Credentials::new(storage::Memory::with_data(Record {
            token: Some(SecretString::new("A".to_owned())),
            refresh_token: None,
        }));
        assert!(credentials.load().await.is_none());
    }

    #[tokio::test]
    async fn file_layout_and_garbage() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        let credentials = Credentials::new(storage::File::at(&path));
        assert!(credentials.is_persistent());

        credentials.save(&pair("A", "R")).await?;
        let stored: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(
            stored,
            serde_json::json!({"token": "A", "refreshToken": "R"})
        );

        fs::write(&path, "not json")?;
        assert!(credentials.load().await.is_none());

        fs::write(&path, r#"{"refreshToken": "R"}"#)?;
        assert!(credentials.load().await.is_none());
        Ok(())
    }
}
