// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Authentication strategies run on every connect and reconnect.

use std::fmt::Debug;

use anyhow::Context;
use async_trait::async_trait;

use super::{client::WsApiClient, error::WsApiResult, requests::Authenticate};
use crate::common::consts::TRADEHUB_SSID_ENV;

/// Authenticates a freshly opened session.
///
/// Runs after the transport opens and before session options are sent. Returning `Ok(false)`
/// or an error fails the connect attempt.
#[async_trait]
pub trait AuthMethod: Send + Sync + Debug {
    /// Authenticates `client` and returns whether the server accepted the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the authentication request fails.
    async fn authenticate(&self, client: &WsApiClient) -> WsApiResult<bool>;
}

/// Authentication with an SSID session token obtained out of band.
#[derive(Clone)]
pub struct SsidAuthMethod {
    ssid: String,
}

impl Debug for SsidAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SsidAuthMethod))
            .field("ssid", &"<redacted>")
            .finish()
    }
}

impl SsidAuthMethod {
    /// Creates a new [`SsidAuthMethod`].
    #[must_use]
    pub fn new(ssid: impl Into<String>) -> Self {
        Self { ssid: ssid.into() }
    }

    /// Creates a new [`SsidAuthMethod`] from the `TRADEHUB_SSID` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn from_env() -> anyhow::Result<Self> {
        let ssid = std::env::var(TRADEHUB_SSID_ENV)
            .with_context(|| format!("{TRADEHUB_SSID_ENV} must be set"))?;
        anyhow::ensure!(!ssid.is_empty(), "{TRADEHUB_SSID_ENV} must not be empty");
        Ok(Self::new(ssid))
    }
}

#[async_trait]
impl AuthMethod for SsidAuthMethod {
    async fn authenticate(&self, client: &WsApiClient) -> WsApiResult<bool> {
        client.request(Authenticate::new(self.ssid.clone())).await
    }
}
