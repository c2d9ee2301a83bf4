// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{
    api::Api,
    error::Result,
    session::{Access, Record},
    storage::Storage,
};

use super::Context;

/// Report whether anyone is signed in. Never fails for lack of a session.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        let state = ctx.session.observe().resolved().await?;
        match state.access() {
            Access::Granted(identity) => println!(
                "Signed in to {} as {} ({}).",
                ctx.server,
                identity.user.username,
                identity.user.display_name()
            ),
            Access::SignIn => println!("Not signed in to {}.", ctx.server),
            Access::Loading => println!("Still checking the session for {}.", ctx.server),
        }

        if ctx.session.is_persistent() {
            println!("Sessions are remembered between commands.");
        } else {
            println!("Sessions are kept in memory only.");
        }
        Ok(())
    }
}
