// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::error;
use tabled::{settings::Style, Table, Tabled};

use crate::{
    api::Api,
    error::{self, Result},
    model::{Registration, RegistrationErrors},
    password,
    session::Record,
    storage::Storage,
};

use super::Context;

/// Create a new account. You still need to sign in afterwards.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Email address for the account.
    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    /// Read the password from the first line of standard input instead of
    /// prompting for it.
    #[arg(long)]
    password_stdin: bool,

    /// The name to register.
    #[clap()]
    username: String,
}

#[derive(Clone, Debug, PartialEq, Tabled)]
struct FieldError {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Problem")]
    message: String,
}

fn field_errors(errors: &RegistrationErrors) -> Vec<FieldError> {
    errors
        .iter()
        .flat_map(|(field, messages)| {
            let messages: Vec<String> = match *messages {
                serde_json::Value::Array(ref items) => items
                    .iter()
                    .map(|item| match *item {
                        serde_json::Value::String(ref s) => s.clone(),
                        ref other => other.to_string(),
                    })
                    .collect(),
                serde_json::Value::String(ref s) => vec![s.clone()],
                ref other => vec![other.to_string()],
            };
            messages.into_iter().map(move |message| FieldError {
                field: field.clone(),
                message,
            })
        })
        .collect()
}

#[async_trait]
impl super::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        let req = password::RequestBuilder::new(&self.username, ctx.server)
            .with_confirmation()
            .into_request();
        let password = if self.password_stdin {
            password::require(&password::StdinPrompt, req).await?
        } else {
            password::require(ctx.prompt, req).await?
        };

        let registration = Registration {
            username: self.username,
            email: self.email,
            password2: password.clone(),
            password,
            first_name: self.first_name,
            last_name: self.last_name,
        };

        let outcome = ctx.session.register(&registration).await;
        if outcome.success {
            println!(
                "Registered {}. Run `{} login {}` to sign in.",
                registration.username,
                *crate::metadata::CLIENT_TYPE_ID,
                registration.username
            );
            return Ok(());
        }

        error!("Could not register {}", registration.username);
        if let Some(errors) = outcome.errors {
            eprintln!(
                "{}",
                Table::new(field_errors(&errors)).with(Style::rounded())
            );
        }
        Err(error::Error::Command)
    }
}
