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

//! Logging helpers for background tasks and binaries.

use tracing_subscriber::EnvFilter;

pub fn log_task_started(task_name: &str) {
    log::debug!("Started task '{task_name}'");
}

pub fn log_task_stopped(task_name: &str) {
    log::debug!("Stopped task '{task_name}'");
}

pub fn log_task_aborted(task_name: &str) {
    log::debug!("Aborted task '{task_name}'");
}

/// Initializes a `tracing` subscriber writing to stdout.
///
/// The filter is taken from `RUST_LOG` when set, otherwise from `default_directives`
/// (for example `"info"` or `"tradehub_client=debug,info"`). Records emitted through the `log`
/// facade are bridged into the subscriber.
///
/// # Errors
///
/// Returns an error if the directives cannot be parsed or a global subscriber is already set.
pub fn init_tracing(default_directives: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}
