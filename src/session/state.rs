// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::watch;

use crate::{
    error::{self, Result},
    model::Identity,
};

/// What the rest of the program knows about who is signed in.
///
/// A state is authenticated exactly when it carries an identity.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct State {
    identity: Option<Identity>,
    is_resolving: bool,
}

impl State {
    /// Before the stored credentials have been checked.
    pub(crate) const fn resolving() -> Self {
        Self {
            identity: None,
            is_resolving: true,
        }
    }

    pub(crate) const fn anonymous() -> Self {
        Self {
            identity: None,
            is_resolving: false,
        }
    }

    pub(crate) const fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_resolving: false,
        }
    }

    pub(crate) const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub(crate) const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub(crate) const fn is_resolving(&self) -> bool {
        self.is_resolving
    }

    pub(crate) const fn access(&self) -> Access<'_> {
        match self.identity {
            Some(ref identity) => Access::Granted(identity),
            None if self.is_resolving => Access::Loading,
            None => Access::SignIn,
        }
    }
}

/// What to show someone given the current state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Access<'state> {
    Loading,
    SignIn,
    Granted(&'state Identity),
}

/// A read-only view of the session state.
#[derive(Clone)]
pub(crate) struct Observer {
    rx: watch::Receiver<State>,
}

impl Observer {
    pub(crate) const fn new(rx: watch::Receiver<State>) -> Self {
        Self { rx }
    }

    pub(crate) fn current(&self) -> State {
        self.rx.borrow().clone()
    }

    /// Waits until the stored credentials have been checked.
    pub(crate) async fn resolved(&mut self) -> Result<State> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if !state.is_resolving() {
                    return Ok(state.clone());
                }
            }
            self.rx.changed().await.map_err(error::Internal::from)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn alice() -> Identity {
        serde_json::from_value(json!({"user": {"id": 1, "username": "alice"}}))
            .unwrap_or_else(|e| panic!("invalid identity: {e}"))
    }

    #[test]
    fn access_follows_state() {
        let identity = alice();

        assert_eq!(State::resolving().access(), Access::Loading);
        assert_eq!(State::anonymous().access(), Access::SignIn);
        assert_eq!(
            State::authenticated(identity.clone()).access(),
            Access::Granted(&identity)
        );
    }

    #[test]
    fn authenticated_iff_identity() {
        for state in [
            State::resolving(),
            State::anonymous(),
            State::authenticated(alice()),
        ] {
            assert_eq!(state.is_authenticated(), state.identity().is_some());
        }
        assert!(!State::authenticated(alice()).is_resolving());
    }

    #[tokio::test]
    async fn resolved_waits_for_first_resolution() -> Result<()> {
        let (tx, rx) = watch::channel(State::resolving());
        let mut observer = Observer::new(rx);
        assert!(observer.current().is_resolving());

        let waiter = tokio::spawn(async move { observer.resolved().await });
        let _previous = tx.send_replace(State::authenticated(alice()));

        let state = waiter.await??;
        assert!(state.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let (tx, rx) = watch::channel(State::resolving());
        let mut observer = Observer::new(rx);
        drop(tx);

        assert!(matches!(
            observer.resolved().await,
            Err(error::Error::Internal(error::Internal::ChannelClosed))
        ));
    }
}
