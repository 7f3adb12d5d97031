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

//! Exponential backoff with full jitter for reconnect loops.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff state machine.
///
/// Each call to [`ExponentialBackoff::next_duration`] grows the internal
/// delay by `factor` up to `delay_max`, then samples uniformly from
/// `0..=delay` (full jitter) so that a fleet of clients reconnecting after a
/// shared outage does not stampede the server in lockstep.
///
/// When `immediate_first` is set the very first call yields [`Duration::ZERO`]
/// so a fresh disconnect is retried without waiting.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    delay_initial: Duration,
    delay_max: Duration,
    delay_current: Duration,
    factor: f64,
    immediate_first: bool,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `delay_initial` is zero or `factor` is below `1.0`.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        immediate_first: bool,
    ) -> Result<Self, String> {
        if delay_initial.is_zero() {
            return Err("delay_initial must be positive".to_string());
        }
        if factor < 1.0 {
            return Err(format!("factor must be >= 1.0, was {factor}"));
        }
        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            immediate_first,
            attempt: 0,
        })
    }

    /// Returns the delay to wait before the next attempt, advancing the
    /// internal state.
    pub fn next_duration(&mut self) -> Duration {
        self.attempt += 1;

        if self.immediate_first && self.attempt == 1 {
            return Duration::ZERO;
        }

        let ceiling = self.delay_current;
        let next = self.delay_current.mul_f64(self.factor);
        self.delay_current = next.min(self.delay_max);

        if ceiling.is_zero() {
            return ceiling;
        }
        let jittered_ms = rand::rng().random_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(jittered_ms)
    }

    /// Resets the backoff to its initial state.
    pub fn reset(&mut self) {
        self.delay_current = self.delay_initial;
        self.attempt = 0;
    }

    /// Returns the current (un-jittered) delay ceiling.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }

    /// Returns the number of attempts since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
