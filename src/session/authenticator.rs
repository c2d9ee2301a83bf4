// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::debug;
use secrecy::{ExposeSecret as _, SecretString};
use tokio::sync::RwLock;

/// Decorates outgoing API requests with the session's bearer token.
///
/// Each session owns its own authenticator; clones share the same token slot,
/// so the API client built for a session sees every `attach` and `detach` the
/// session makes. The last `attach` wins.
#[derive(Clone, Default)]
pub(crate) struct Authenticator {
    bearer: Arc<RwLock<Option<SecretString>>>,
}

impl Authenticator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn attach(&self, access_token: &SecretString) {
        let mut guard = self.bearer.write().await;
        *guard = Some(access_token.clone());
        debug!("Attached bearer token to outgoing requests");
    }

    pub(crate) async fn detach(&self) {
        let mut guard = self.bearer.write().await;
        if guard.take().is_some() {
            debug!("Detached bearer token from outgoing requests");
        }
    }

    /// The value of the `Authorization` header requests currently get.
    #[cfg(test)]
    pub(crate) async fn authorization(&self) -> Option<String> {
        self.bearer
            .read()
            .await
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    pub(crate) async fn decorate(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match *self.bearer.read().await {
            Some(ref token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::AUTHORIZATION;

    use crate::error::Result;

    use super::*;

    #[tokio::test]
    async fn last_attach_wins() {
        let authenticator = Authenticator::new();
        assert_eq!(authenticator.authorization().await, None);

        authenticator
            .attach(&SecretString::new("A".to_owned()))
            .await;
        authenticator
            .clone()
            .attach(&SecretString::new("B".to_owned()))
            .await;
        assert_eq!(
            authenticator.authorization().await.as_deref(),
            Some("Bearer B")
        );

        authenticator.detach().await;
        authenticator.detach().await;
        assert_eq!(authenticator.authorization().await, None);
    }

    #[tokio::test]
    async fn decorate_sets_header_only_when_attached() -> Result<()> {
        let http = reqwest::Client::new();
        let authenticator = Authenticator::new();

        let req = authenticator
            .decorate(http.get("http://localhost/api/users/profile/"))
            .await
            .build()?;
        assert!(req.headers().get(AUTHORIZATION).is_none());

        authenticator
            .attach(&SecretString::new("A".to_owned()))
            .await;
        let req = authenticator
            .decorate(http.get("http://localhost/api/users/profile/"))
            .await
            .build()?;
        assert_eq!(
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
            Some("Bearer A")
        );
        Ok(())
    }
}
