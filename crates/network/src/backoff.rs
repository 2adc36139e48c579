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

//! Exponential backoff with additive jitter.
//!
//! Each failed attempt moves the delay to `min(previous × factor, max) + jitter`, where the
//! jitter is drawn uniformly from `[0, jitter_ms)`. The jitter becomes part of the stored delay,
//! so the next step scales it as well. [`ExponentialBackoff::reset`] returns to the initial delay.

use std::time::Duration;

use rand::Rng;

/// Reconnect delay generator.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    delay_initial: Duration,
    delay_max: Duration,
    delay_current: Duration,
    factor: f64,
    jitter_ms: u64,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `delay_initial` is zero.
    /// - `delay_max` is less than `delay_initial`.
    /// - `factor` is not a finite value of at least 1.0.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
    ) -> anyhow::Result<Self> {
        if delay_initial.is_zero() {
            anyhow::bail!("delay_initial must be non-zero");
        }
        if delay_max < delay_initial {
            anyhow::bail!("delay_max ({delay_max:?}) must be >= delay_initial ({delay_initial:?})");
        }
        if !factor.is_finite() || factor < 1.0 {
            anyhow::bail!("factor must be a finite value >= 1.0, was {factor}");
        }

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
        })
    }

    /// Returns the delay to wait before the next attempt.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.delay_current
    }

    /// Advances the backoff after a failed attempt and returns the new delay.
    pub fn next_duration(&mut self) -> Duration {
        let scaled_ms = (self.delay_current.as_millis() as f64 * self.factor).round() as u64;
        let capped_ms = scaled_ms.min(self.delay_max.as_millis() as u64);
        let jitter_ms = if self.jitter_ms > 0 {
            rand::rng().random_range(0..self.jitter_ms)
        } else {
            0
        };

        self.delay_current = Duration::from_millis(capped_ms + jitter_ms);
        self.delay_current
    }

    /// Resets the delay to its initial value.
    pub fn reset(&mut self) {
        self.delay_current = self.delay_initial;
    }
}
