// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use futures_util::lock::Mutex;
use log::{debug, error, info, warn};
use secrecy::SecretString;
use tokio::{sync::watch, time};

use crate::{
    api::Api,
    error::{self, Result},
    model::{self, Identity, Registration, RegistrationErrors},
    storage::Storage,
};

use super::{
    credentials::{CredentialPair, Credentials, Record},
    state::{Observer, State},
    Authenticator,
};

/// Tuning for how long we wait on the profile endpoint.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Options {
    pub(crate) resolve_timeout: Duration,
    pub(crate) resolve_retries: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(10),
            resolve_retries: 1,
        }
    }
}

/// The result of a registration attempt.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RegisterOutcome {
    pub(crate) success: bool,
    pub(crate) errors: Option<RegistrationErrors>,
}

impl RegisterOutcome {
    const fn succeeded() -> Self {
        Self {
            success: true,
            errors: None,
        }
    }

    const fn failed(errors: RegistrationErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
        }
    }
}

/// Owns everything about who is signed in: the stored credentials, the
/// bearer token on outgoing requests, and the state everyone else observes.
///
/// Only the manager changes the state. Network failures never escape it;
/// they turn into `false`, a [`RegisterOutcome`], or a sign-out.
pub(crate) struct Manager<A, S> {
    api: A,
    credentials: Credentials<S>,
    state: watch::Sender<State>,
    options: Options,
    bootstrapped: AtomicBool,
    // Bumped by every login and logout. A login may only commit while its
    // generation is the latest one.
    generation: AtomicU64,
    // Held while writing credentials together with the bearer token, or
    // while clearing them together with the state. Holds the generation of
    // the login whose tokens were last written, or zero once signed out.
    commit: Mutex<u64>,
}

impl<A: Api, S: Storage<Record>> Manager<A, S> {
    pub(crate) fn new(api: A, storage: S, options: Options) -> Self {
        let (state, _) = watch::channel(State::resolving());
        Self {
            api,
            credentials: Credentials::new(storage),
            state,
            options,
            bootstrapped: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            commit: Mutex::new(0),
        }
    }

    pub(crate) fn observe(&self) -> Observer {
        Observer::new(self.state.subscribe())
    }

    pub(crate) fn authenticator(&self) -> &Authenticator {
        self.api.authenticator()
    }

    pub(crate) const fn is_persistent(&self) -> bool {
        self.credentials.is_persistent()
    }

    fn publish(&self, state: State) {
        debug!(
            "Session state is now authenticated={}, resolving={}",
            state.is_authenticated(),
            state.is_resolving()
        );
        let _previous = self.state.send_replace(state);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Checks the stored credentials, if any, and settles the initial state.
    ///
    /// Only the first call does any work; later calls wait for it to finish
    /// and return the state it settled on.
    pub(crate) async fn bootstrap(&self) -> State {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            return self.wait_resolved().await;
        }

        match self.credentials.load().await {
            None => {
                info!("No stored credentials, so nobody is signed in");
                self.publish(State::anonymous());
            }
            Some(pair) => {
                self.authenticator().attach(pair.access_token()).await;
                match self.resolve_identity().await {
                    Ok(identity) => {
                        info!("Resumed session for {}", identity.user.username);
                        self.publish(State::authenticated(identity));
                    }
                    Err(e) => {
                        warn!(
                            "Could not resolve the stored session, so we have to sign out: {}",
                            e
                        );
                        self.sign_out().await;
                    }
                }
            }
        }

        self.observe().current()
    }

    async fn wait_resolved(&self) -> State {
        match self.observe().resolved().await {
            Ok(state) => state,
            // We hold the sender, so the channel cannot close under us.
            Err(e) => {
                error!("Lost track of the session state: {}", e);
                State::anonymous()
            }
        }
    }

    /// Leaves the initial state before any flow touches the session.
    async fn ensure_bootstrapped(&self) {
        let _state = self.bootstrap().await;
    }

    /// Fetches the profile for the attached token, giving up after the
    /// configured timeout and retries.
    async fn resolve_identity(&self) -> Result<Identity> {
        let mut attempt = 0_u32;
        loop {
            let result = match time::timeout(self.options.resolve_timeout, self.api.fetch_identity())
                .await
            {
                Ok(result) => result,
                Err(_) => Err(error::Api::Timeout {
                    operation: "profile request",
                    after: self.options.resolve_timeout,
                }
                .into()),
            };

            match result {
                Ok(identity) => return Ok(identity),
                Err(e) if e.is_unauthorized() || attempt >= self.options.resolve_retries => {
                    return Err(e)
                }
                Err(e) => {
                    attempt += 1;
                    warn!(
                        "Profile request failed, so we will try again (attempt {} of {}): {}",
                        attempt + 1,
                        self.options.resolve_retries + 1,
                        e
                    );
                }
            }
        }
    }

    /// Signs in with a username and password.
    ///
    /// Returns whether this attempt is the one that signed in. Nothing is
    /// stored unless the server issued tokens, and an attempt overtaken by a
    /// later login or logout changes nothing when it completes.
    pub(crate) async fn login(&self, username: &str, password: &SecretString) -> bool {
        self.ensure_bootstrapped().await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tokens = match self.api.issue_token(username, password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Login as {} failed: {}", username, e);
                return false;
            }
        };

        {
            let mut owner = self.commit.lock().await;
            if !self.is_current(generation) {
                info!("Discarding tokens for {} from an overtaken login", username);
                return false;
            }

            let pair = CredentialPair::from(tokens);
            if let Err(e) = self.credentials.save(&pair).await {
                error!("Failed to store credentials for {}: {}", username, e);
                return false;
            }
            self.authenticator().attach(pair.access_token()).await;
            *owner = generation;
        }

        match self.resolve_identity().await {
            Ok(identity) => {
                let owner = self.commit.lock().await;
                if !self.is_current(generation) {
                    info!("Discarding profile for {} from an overtaken login", username);
                    drop(owner);
                    self.abandon(generation).await;
                    return false;
                }
                info!("Signed in as {}", identity.user.username);
                self.publish(State::authenticated(identity));
                true
            }
            // Unlike a browser session, which reports success after the
            // forced sign-out, an unconfirmed login counts as a failed one.
            Err(e) => {
                if self.is_current(generation) {
                    warn!(
                        "Could not resolve the profile for {}, so we have to sign out: {}",
                        username, e
                    );
                    self.sign_out().await;
                } else {
                    self.abandon(generation).await;
                }
                false
            }
        }
    }

    /// Undoes the writes of an overtaken login, unless a later login or a
    /// sign-out already replaced them.
    async fn abandon(&self, generation: u64) {
        let mut owner = self.commit.lock().await;
        if *owner != generation {
            return;
        }

        info!("Rolling back credentials written by an overtaken login");
        if let Err(e) = self.credentials.clear().await {
            error!("Failed to remove stored credentials: {}", e);
        }
        self.authenticator().detach().await;
        *owner = 0;
        self.publish(State::anonymous());
    }

    /// Creates an account. This does not sign anyone in.
    pub(crate) async fn register(&self, registration: &Registration) -> RegisterOutcome {
        if let Err(e) = registration.validate() {
            warn!("Not sending registration: {}", e);
            // LINT: Only a missing field can be pinned to a field name.
            #[allow(clippy::wildcard_enum_match_arm)]
            let errors = match e {
                error::Error::Api(error::Api::MissingField(field)) => {
                    let mut errors = RegistrationErrors::new();
                    let _ = errors.insert(
                        field.to_owned(),
                        serde_json::json!(["This field may not be blank."]),
                    );
                    errors
                }
                _ => model::generic_registration_errors(),
            };
            return RegisterOutcome::failed(errors);
        }

        match self.api.register(registration).await {
            Ok(created) => {
                info!("Registered {}", registration.username);
                debug!("Registration response: {}", created);
                RegisterOutcome::succeeded()
            }
            Err(e) => {
                warn!("Registration of {} failed: {}", registration.username, e);
                // LINT: Only a response from the server carries field errors.
                #[allow(clippy::wildcard_enum_match_arm)]
                let errors = match e {
                    error::Error::Api(error::Api::Status { ref body, .. }) => {
                        serde_json::from_str::<RegistrationErrors>(body)
                            .ok()
                            .filter(|errors| !errors.is_empty())
                    }
                    _ => None,
                };
                RegisterOutcome::failed(errors.unwrap_or_else(model::generic_registration_errors))
            }
        }
    }

    /// Signs out. Safe to call when nobody is signed in.
    pub(crate) async fn logout(&self) {
        self.ensure_bootstrapped().await;
        self.sign_out().await;
    }

    async fn sign_out(&self) {
        let _ = self.generation.fetch_add(1, Ordering::SeqCst);

        let mut owner = self.commit.lock().await;
        if let Err(e) = self.credentials.clear().await {
            error!("Failed to remove stored credentials: {}", e);
        }
        self.authenticator().detach().await;
        *owner = 0;
        self.publish(State::anonymous());
    }
}
