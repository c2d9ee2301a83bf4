// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    ffi::OsString,
    io::{self, BufRead as _},
    path::Path,
};

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use tokio::task;

use crate::{
    error::{self, Result},
    metadata,
};

#[derive(Debug, Clone)]
pub(crate) struct Request {
    username: String,
    server: String,
    confirm: bool,
}

pub(crate) struct RequestBuilder {
    username: String,
    server: String,
    confirm: bool,
}

impl RequestBuilder {
    pub(crate) fn new(username: &str, server: &url::Url) -> Self {
        Self {
            username: username.to_owned(),
            server: server.to_string(),
            confirm: false,
        }
    }

    /// Ask for the password twice, as when choosing a new one.
    pub(crate) const fn with_confirmation(mut self) -> Self {
        self.confirm = true;
        self
    }

    pub(crate) fn into_request(self) -> Request {
        Request {
            username: self.username,
            server: self.server,
            confirm: self.confirm,
        }
    }
}

impl Request {
    fn description(&self) -> String {
        if self.confirm {
            format!(
                "Choose a password for the new account {} at {}.",
                self.username, self.server
            )
        } else {
            format!("Enter the password for {} at {}.", self.username, self.server)
        }
    }
}

#[async_trait]
pub(crate) trait Prompt: Send + Sync {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>>;
}

#[async_trait]
impl<T: Prompt + ?Sized> Prompt for Box<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        (**self).prompt(req).await
    }
}

#[async_trait]
impl<T: Prompt> Prompt for Vec<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        for candidate in self {
            if let r @ (Ok(Some(_)) | Err(_)) = candidate.prompt(req.clone()).await {
                return r;
            }
        }

        Ok(None)
    }
}

/// Asks for a password, failing if no prompt could.
pub(crate) async fn require<P: Prompt + ?Sized>(prompt: &P, req: Request) -> Result<SecretString> {
    Ok(prompt
        .prompt(req)
        .await?
        .ok_or(error::Password::NoPrompt)?)
}

pub(crate) struct PinentryPrompt {
    executable: Option<OsString>,
}

impl PinentryPrompt {
    pub(crate) const fn new() -> Self {
        Self { executable: None }
    }

    pub(crate) fn new_with_executable<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: Some(executable.as_ref().as_os_str().into()),
        }
    }
}

#[async_trait]
impl Prompt for PinentryPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        fn interact<'input>(
            mut input: pinentry::PassphraseInput<'input>,
            title: &'input str,
            description: &'input str,
            confirm: bool,
        ) -> Result<SecretString> {
            _ = input.required("A password is required to continue.");
            _ = input.with_title(title);
            _ = input.with_description(description);
            _ = input.with_prompt("Password");
            if confirm {
                _ = input.with_confirmation("Repeat password", "The passwords do not match.");
            }

            Ok(input.interact()?)
        }

        let title = format!("Password - {}", *metadata::CLIENT_DISPLAY_NAME);
        let description = req.description();
        let confirm = req.confirm;

        let input = self
            .executable
            .as_ref()
            .and_then(pinentry::PassphraseInput::with_binary)
            .or_else(pinentry::PassphraseInput::with_default_binary)
            .map(|input| {
                task::spawn_blocking(move || interact(input, &title, &description, confirm))
            });

        Ok(match input {
            Some(fut) => Some(fut.await??),
            None => None,
        })
    }
}

pub(crate) struct RpasswordPrompt;

#[async_trait]
impl Prompt for RpasswordPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        eprintln!("{}", req.description());

        Ok(Some(
            task::spawn_blocking(move || loop {
                let password = SecretString::new(rpassword::prompt_password("Password: ")?);
                if !req.confirm {
                    return Ok::<_, io::Error>(password);
                }

                let repeated = rpassword::prompt_password("Repeat password: ")?;
                if password.expose_secret() == &repeated {
                    return Ok(password);
                }
                eprintln!("Error: The passwords do not match.");
            })
            .await??,
        ))
    }
}

/// Reads a single line from standard input, for use in scripts.
pub(crate) struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    async fn prompt(&self, _req: Request) -> Result<Option<SecretString>> {
        let line = task::spawn_blocking(|| {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line)?;
            Ok::<_, io::Error>(line)
        })
        .await??;

        let password = line.trim_end_matches(&['\r', '\n'][..]);
        Ok((!password.is_empty()).then(|| SecretString::new(password.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl Prompt for Fixed {
        async fn prompt(&self, _req: Request) -> Result<Option<SecretString>> {
            Ok(self.0.map(|password| SecretString::new(password.to_owned())))
        }
    }

    fn request() -> Result<Request> {
        Ok(RequestBuilder::new("alice", &"https://tasks.example.com/".parse()?).into_request())
    }

    #[tokio::test]
    async fn first_answering_prompt_wins() -> Result<()> {
        let prompts = vec![Fixed(None), Fixed(Some("first")), Fixed(Some("second"))];

        let password = require(&prompts, request()?).await?;
        assert_eq!(password.expose_secret(), "first");
        Ok(())
    }

    #[tokio::test]
    async fn no_answer_is_an_error() -> Result<()> {
        let prompts = vec![Fixed(None)];

        assert!(matches!(
            require(&prompts, request()?).await,
            Err(error::Error::Password(error::Password::NoPrompt))
        ));
        Ok(())
    }

    #[test]
    fn description_mentions_account_and_server() -> Result<()> {
        let req = request()?;
        assert_eq!(
            req.description(),
            "Enter the password for alice at https://tasks.example.com/."
        );

        let req = RequestBuilder::new("carol", &"https://tasks.example.com/".parse()?)
            .with_confirmation()
            .into_request();
        assert_eq!(
            req.description(),
            "Choose a password for the new account carol at https://tasks.example.com/."
        );
        Ok(())
    }
}
