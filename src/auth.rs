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

//! Authentication cache: at most one liveness probe per cache window.

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use log::debug;

use crate::raw::api::ObsApi;
use crate::retry;
use crate::retry::RetryPolicy;
use crate::types::ErrorKind;
use crate::types::Result;

/// Default window a successful probe stays cached.
pub const DEFAULT_AUTH_CACHE_TTL: Duration = Duration::from_secs(300);

/// AuthCache gates every state-sensitive operation behind a cached
/// head-bucket probe.
///
/// State machine: unknown -> authenticated(expiry) -> unknown, on expiry or
/// explicit [`invalidate`]. Failures are never cached: a failed probe leaves
/// the state unknown so the next call re-probes.
///
/// [`invalidate`]: AuthCache::invalidate
pub(crate) struct AuthCache {
    ttl: Duration,
    expires_at: Mutex<Option<Instant>>,
}

impl AuthCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expires_at: Mutex::new(None),
        }
    }

    /// Return immediately if a probe succeeded within the cache window,
    /// otherwise run a retry-wrapped head-bucket probe.
    ///
    /// Probe failures keep their classified kind: `PermissionDenied` for
    /// rejected credentials, `ConfigInvalid` for a missing or unreachable
    /// bucket. Anything else propagates as classified by the client; the
    /// retry wrapper has already dealt with transient failures.
    pub(crate) fn ensure(&self, api: &dyn ObsApi, policy: &RetryPolicy) -> Result<()> {
        {
            let state = self.expires_at.lock().expect("auth cache lock poisoned");
            if let Some(expiry) = *state {
                if Instant::now() < expiry {
                    return Ok(());
                }
            }
        }

        match retry::execute(policy, || api.head_bucket()) {
            Ok(()) => {
                let mut state = self.expires_at.lock().expect("auth cache lock poisoned");
                *state = Some(Instant::now() + self.ttl);
                Ok(())
            }
            Err(err) => {
                let err = match err.kind() {
                    ErrorKind::PermissionDenied => err
                        .with_operation("AuthCache::ensure")
                        .with_context("probe", "credentials rejected by head-bucket"),
                    ErrorKind::ConfigInvalid => err
                        .with_operation("AuthCache::ensure")
                        .with_context("probe", "bucket missing or inaccessible"),
                    _ => err.with_operation("AuthCache::ensure"),
                };
                Err(err)
            }
        }
    }

    /// Clear the cached state unconditionally. The next [`ensure`] call
    /// re-probes.
    ///
    /// [`ensure`]: AuthCache::ensure
    pub(crate) fn invalidate(&self) {
        debug!("auth cache invalidated");
        let mut state = self.expires_at.lock().expect("auth cache lock poisoned");
        *state = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::test_utils::MockApi;
    use crate::types::Error;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(1, Duration::ZERO)
    }

    #[test]
    fn test_probe_cached_within_window() {
        let api = MockApi::new();
        let cache = AuthCache::new(Duration::from_secs(300));

        cache.ensure(&api, &policy()).unwrap();
        cache.ensure(&api, &policy()).unwrap();
        cache.ensure(&api, &policy()).unwrap();

        assert_eq!(api.head_bucket_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_forces_reprobe() {
        let api = MockApi::new();
        let cache = AuthCache::new(Duration::from_secs(300));

        cache.ensure(&api, &policy()).unwrap();
        cache.invalidate();
        cache.ensure(&api, &policy()).unwrap();

        assert_eq!(api.head_bucket_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_probe_not_cached() {
        let api = MockApi::new();
        api.fail_head_bucket(Error::new(
            ErrorKind::PermissionDenied,
            "access denied",
        ));

        let cache = AuthCache::new(Duration::from_secs(300));

        let err = cache.ensure(&api, &policy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        // The failure was not cached: the next call probes again and succeeds.
        cache.ensure(&api, &policy()).unwrap();
        assert_eq!(api.head_bucket_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bucket_error_keeps_kind() {
        let api = MockApi::new();
        api.fail_head_bucket(Error::new(ErrorKind::ConfigInvalid, "NoSuchBucket"));

        let cache = AuthCache::new(Duration::from_secs(300));
        let err = cache.ensure(&api, &policy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_expired_window_reprobes() {
        let api = MockApi::new();
        let cache = AuthCache::new(Duration::ZERO);

        cache.ensure(&api, &policy()).unwrap();
        cache.ensure(&api, &policy()).unwrap();

        assert_eq!(api.head_bucket_calls.load(Ordering::SeqCst), 2);
    }
}
