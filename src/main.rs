// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod api;
mod command;
mod error;
mod metadata;
mod model;
mod password;
mod session;
mod storage;

use std::{path::PathBuf, process, time::Duration};

use api::{Api, HttpApi};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use command::Context;
use error::Result;
use log::{error, info, warn};
use session::{Manager, Options, Record};
use storage::Storage;
use url::Url;

#[derive(Debug, Subcommand)]
enum Command {
    Login(command::login::Command),
    Logout(command::logout::Command),
    Register(command::register::Command),
    Status(command::status::Command),
    Whoami(command::whoami::Command),
}

#[async_trait]
impl command::Command for Command {
    async fn execute<A: Api, S: Storage<Record>>(self, ctx: Context<'_, A, S>) -> Result<()> {
        match self {
            Self::Login(cmd) => cmd.execute(ctx).await,
            Self::Logout(cmd) => cmd.execute(ctx).await,
            Self::Register(cmd) => cmd.execute(ctx).await,
            Self::Status(cmd) => cmd.execute(ctx).await,
            Self::Whoami(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The base URL of the task and team management API.
    #[arg(long, env = "TASKDECK_URL", default_value = "http://127.0.0.1:8000/", value_parser = Url::parse)]
    url: Url,

    /// Turn off remembering the session between commands.
    #[arg(long)]
    no_persist_session: bool,

    /// How many seconds to wait for the server to confirm a session before
    /// signing out.
    #[arg(long, default_value_t = 10)]
    resolve_timeout: u64,

    /// How many more times to ask the server to confirm a session after a
    /// failure that is not an outright rejection.
    #[arg(long, default_value_t = 1)]
    resolve_retries: u32,

    /// The path to the Pinentry program to use when asking for passwords.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

async fn get_session_storage(args: &Args) -> Box<dyn Storage<Record>> {
    if !args.no_persist_session {
        #[cfg(feature = "secret-service")]
        match storage::SecretService::new(&args.url).await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match storage::Keychain::new(&args.url) {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = storage::File::new(metadata::SESSION_FILE) {
            info!(
                "Keeping the session in {}",
                file_storage.path().display()
            );
            return Box::new(file_storage);
        }
        warn!(
            "{}, so the session will be kept in memory only",
            error::Storage::NoProjectDirs
        );
    }

    Box::new(storage::Memory::<Record>::new())
}

async fn run(args: Args) -> Result<()> {
    let prompt: Vec<Box<dyn password::Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            password::PinentryPrompt::new,
            password::PinentryPrompt::new_with_executable,
        )),
        Box::new(password::RpasswordPrompt),
    ];

    let api = HttpApi::new(args.url.clone())?;
    let server = api.base().clone();
    let session = Manager::new(
        api,
        get_session_storage(&args).await,
        Options {
            resolve_timeout: Duration::from_secs(args.resolve_timeout),
            resolve_retries: args.resolve_retries,
        },
    );

    let ctx = Context {
        session: &session,
        prompt: &prompt,
        server: &server,
    };
    let (_state, result) = tokio::join!(
        session.bootstrap(),
        command::Command::execute(args.command, ctx)
    );

    result
}

#[tokio::main]
async fn main() {
    let logger_env = env_logger::Env::new()
        .filter_or("TASKDECK_LOG", "warn")
        .write_style("TASKDECK_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
