// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use tabled::{settings::Style, Table};

use crate::{api::Api, error::Result, session::Record, storage::Storage};

use super::Context;

/// Show the profile of the signed-in user.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Only print the username.
    #[arg(long, short)]
    short: bool,
}

#[async_trait]
impl super::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        let identity = super::require_identity(ctx.session).await?;

        if self.short {
            println!("{}", identity.user.username);
        } else {
            println!("{}", Table::new(identity.rows()).with(Style::rounded()));
        }
        Ok(())
    }
}
