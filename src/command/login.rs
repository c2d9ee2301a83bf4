// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::{error, info};

use crate::{
    api::Api,
    error::{self, Result},
    password,
    session::Record,
    storage::Storage,
};

use super::Context;

/// Sign in and remember the session for later commands.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Read the password from the first line of standard input instead of
    /// prompting for it.
    #[arg(long)]
    password_stdin: bool,

    /// The account to sign in as.
    #[clap()]
    username: String,
}

#[async_trait]
impl super::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        let state = ctx.session.observe().resolved().await?;
        if let Some(identity) = state.identity() {
            info!(
                "Replacing the session of {} with a new one for {}",
                identity.user.username, self.username
            );
        }

        let req = password::RequestBuilder::new(&self.username, ctx.server).into_request();
        let password = if self.password_stdin {
            password::require(&password::StdinPrompt, req).await?
        } else {
            password::require(ctx.prompt, req).await?
        };

        if !ctx.session.login(&self.username, &password).await {
            error!("Could not sign in as {}", self.username);
            return Err(error::Error::Command);
        }

        let name = ctx
            .session
            .observe()
            .current()
            .identity()
            .map_or_else(|| self.username.clone(), |identity| identity.user.display_name());
        println!("Signed in as {name}.");
        if !ctx.session.is_persistent() {
            println!("The session will not be remembered after this command exits.");
        }
        Ok(())
    }
}
