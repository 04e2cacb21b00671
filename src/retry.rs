// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Bounded exponential-backoff retry for single remote calls.
//!
//! Only [`Error::is_temporary`] failures are retried. Credential and bucket
//! failures are classified permanent at parse time and re-raise immediately.
//! An error that survives all attempts is marked persistent so callers can
//! tell "failed after retry" from "never retried".

use std::time::Duration;

use backon::BlockingRetryable;
use backon::ExponentialBuilder;
use log::warn;

use crate::types::Error;
use crate::types::Result;

/// RetryPolicy is the stateless configuration of [`execute`].
///
/// The delay before attempt `n + 1` is `base_delay * 2^(n - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy. `max_attempts` is clamped to at least one so an
    /// operation always runs.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Total attempts one operation gets, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Base delay of the exponential backoff.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Run `op`, retrying temporary failures per `policy`.
///
/// Blocks the calling thread during backoff delays.
pub fn execute<T, F>(policy: &RetryPolicy, op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let backoff = ExponentialBuilder::default()
        .with_min_delay(policy.base_delay)
        .with_factor(2.0)
        .with_max_times(policy.max_attempts - 1);

    op.retry(backoff)
        .when(|err: &Error| err.is_temporary())
        .notify(|err: &Error, dur: Duration| {
            warn!("retrying after {}ms: {}", dur.as_millis(), err);
        })
        .call()
        .map_err(|err| {
            if err.is_temporary() {
                err.set_persistent()
            } else {
                err
            }
        })
}
