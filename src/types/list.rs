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

use std::time::Duration;

/// The largest number of keys a single list page may request.
///
/// This is the service-side ceiling for `max-keys`; asking for more gets
/// silently clamped by OBS, so we clamp it ourselves.
pub const MAX_PAGE_SIZE: usize = 1000;

/// How many pages one listing call may fetch before it is considered stuck.
///
/// A well-behaved listing terminates by returning an absent next marker. A
/// remote that keeps handing out fresh markers past this ceiling is treated
/// as misbehaving and the listing fails with
/// [`ErrorKind::PaginationExhausted`](crate::ErrorKind::PaginationExhausted).
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// ListingBudget bounds a single listing call.
///
/// The budget is consulted before each page fetch and after each yielded
/// entry. Exceeding the key or time budget terminates the listing silently;
/// only the iteration ceiling is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListingBudget {
    max_keys: usize,
    timeout: Duration,
    max_iterations: usize,
}

impl Default for ListingBudget {
    fn default() -> Self {
        Self {
            max_keys: 0,
            timeout: Duration::ZERO,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ListingBudget {
    /// Create an unbounded budget: no key limit, no timeout, default
    /// iteration ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of entries emitted. `0` means unbounded.
    pub fn with_max_keys(mut self, v: usize) -> Self {
        self.max_keys = v;
        self
    }

    /// Limit the wall-clock time of the listing. Checked at page boundaries
    /// only, a long single-page fetch is not interrupted. `Duration::ZERO`
    /// means unbounded.
    pub fn with_timeout(mut self, v: Duration) -> Self {
        self.timeout = v;
        self
    }

    /// Override the iteration ceiling.
    pub fn with_max_iterations(mut self, v: usize) -> Self {
        self.max_iterations = v;
        self
    }

    /// The entry budget. `0` means unbounded.
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// The time budget. `Duration::ZERO` means unbounded.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The iteration ceiling.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// How many keys the next page may ask for, given how many entries have
    /// already been emitted.
    pub(crate) fn page_size(&self, emitted: usize) -> usize {
        if self.max_keys == 0 {
            MAX_PAGE_SIZE
        } else {
            MAX_PAGE_SIZE.min(self.max_keys.saturating_sub(emitted))
        }
    }

    /// Whether the entry budget has been reached.
    pub(crate) fn keys_exhausted(&self, emitted: usize) -> bool {
        self.max_keys != 0 && emitted >= self.max_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size() {
        let unbounded = ListingBudget::new();
        assert_eq!(unbounded.page_size(0), MAX_PAGE_SIZE);
        assert_eq!(unbounded.page_size(5000), MAX_PAGE_SIZE);

        let bounded = ListingBudget::new().with_max_keys(1500);
        assert_eq!(bounded.page_size(0), MAX_PAGE_SIZE);
        assert_eq!(bounded.page_size(600), 900);
        assert_eq!(bounded.page_size(1500), 0);
    }

    #[test]
    fn test_keys_exhausted() {
        let unbounded = ListingBudget::new();
        assert!(!unbounded.keys_exhausted(usize::MAX));

        let bounded = ListingBudget::new().with_max_keys(5);
        assert!(!bounded.keys_exhausted(4));
        assert!(bounded.keys_exhausted(5));
    }
}
