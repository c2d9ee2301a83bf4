// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use url::Url;

use crate::metadata;

/// Names the entry holding one API server's credentials in a platform
/// secret store.
///
/// The same server always maps to the same entry, whether or not its URL
/// was given with a trailing slash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    server: String,
}

impl Slot {
    pub(crate) fn for_server(api_url: &Url) -> Self {
        let mut server = api_url.clone();
        server.set_query(None);
        server.set_fragment(None);
        if !server.path().ends_with('/') {
            let path = format!("{}/", server.path());
            server.set_path(&path);
        }

        Self {
            server: server.into(),
        }
    }

    /// Keychain service name shared by every server.
    pub(crate) fn service(&self) -> String {
        format!("{}.credentials", *metadata::CLIENT_TYPE_ID)
    }

    /// Keychain account name, one per server.
    pub(crate) fn account(&self) -> &str {
        &self.server
    }

    /// Human-readable name shown by keyring managers.
    pub(crate) fn label(&self) -> String {
        format!("{} credentials for {}", *metadata::CLIENT_DISPLAY_NAME, self.server)
    }

    /// Secret service lookup attributes.
    pub(crate) fn attributes(&self) -> HashMap<String, String> {
        let prefix = metadata::CLIENT_TYPE_ID.as_str();
        HashMap::from([
            (format!("{prefix}.kind"), "credentials".to_owned()),
            (format!("{prefix}.url"), self.server.clone()),
        ])
    }
}
