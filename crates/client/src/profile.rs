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

//! Current user profile.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::websocket::{
    client::WsApiClient,
    error::WsApiResult,
    requests::{Request, service_message},
};

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileResultMsg {
    pub user_id: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileMsg {
    pub result: ProfileResultMsg,
}

/// `core.get-profile`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GetProfile;

impl Request for GetProfile {
    type Response = ProfileMsg;

    fn message_body(&self) -> Value {
        service_message("core.get-profile", "1.0", json!({}))
    }
}

/// The authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: u64,
}

impl UserProfile {
    /// Requests the profile of the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply cannot be decoded.
    pub async fn fetch(client: &WsApiClient) -> WsApiResult<Self> {
        let profile = client.request(GetProfile).await?;
        Ok(Self::from(profile))
    }
}

impl From<ProfileMsg> for UserProfile {
    fn from(msg: ProfileMsg) -> Self {
        Self {
            user_id: msg.result.user_id,
        }
    }
}
