// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod authenticator;
mod credentials;
mod manager;
mod state;

pub(crate) use authenticator::Authenticator;
pub(crate) use credentials::Record;
pub(crate) use manager::{Manager, Options};
pub(crate) use state::Access;
