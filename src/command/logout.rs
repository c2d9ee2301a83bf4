// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{api::Api, error::Result, session::Record, storage::Storage};

use super::Context;

/// Sign out and forget the stored session.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        ctx.session.logout().await;
        println!("Signed out.");
        Ok(())
    }
}
