// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log::error;

use crate::{
    api::Api,
    error::{self, Result},
    model::Identity,
    password,
    session::{Access, Manager, Record},
    storage::Storage,
};

pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod register;
pub(crate) mod status;
pub(crate) mod whoami;

/// What a command gets to work with.
pub(crate) struct Context<'ctx, A, S> {
    pub(crate) session: &'ctx Manager<A, S>,
    pub(crate) prompt: &'ctx (dyn password::Prompt + 'ctx),
    pub(crate) server: &'ctx url::Url,
}

#[async_trait]
pub(crate) trait Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()>;
}

/// Waits for the session to settle and returns the signed-in identity.
pub(crate) async fn require_identity<A: Api, S: Storage<Record>>(
    session: &Manager<A, S>,
) -> Result<Identity> {
    let state = session.observe().resolved().await?;
    match state.access() {
        Access::Granted(identity) => Ok(identity.clone()),
        Access::Loading | Access::SignIn => {
            error!(
                "You are not signed in; run `{} login <username>` first",
                *crate::metadata::CLIENT_TYPE_ID
            );
            Err(error::Error::Command)
        }
    }
}
