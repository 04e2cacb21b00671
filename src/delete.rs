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

//! Bulk deletion of a whole key prefix.
//!
//! The walk reuses the cursor guards of the pagination engine but runs in
//! keys-only mode and without budgets: removing a directory must be complete
//! or fail, never partial-by-budget. All keys are collected first and then
//! removed with one batch call, which keeps the remote round trips at
//! `pages + 1`.

use std::collections::HashSet;

use log::debug;

use crate::lister::CursorState;
use crate::lister::Turn;
use crate::raw::api::ObsApi;
use crate::retry;
use crate::retry::RetryPolicy;
use crate::types::Error;
use crate::types::ErrorKind;
use crate::types::Result;
use crate::types::DEFAULT_MAX_ITERATIONS;
use crate::types::MAX_PAGE_SIZE;

/// Collect every object key under `prefix`, across all pages.
///
/// Unlike a listing, this includes the directory-marker object itself: the
/// point is to empty the namespace, not to describe it.
pub(crate) fn collect_keys(
    api: &dyn ObsApi,
    prefix: &str,
    policy: &RetryPolicy,
) -> Result<Vec<String>> {
    let mut cursor = CursorState::new(DEFAULT_MAX_ITERATIONS);
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    loop {
        match cursor.check()? {
            Turn::Stop => break,
            Turn::Fetch => {}
        }

        let marker = cursor.marker().map(str::to_string);
        let output = retry::execute(policy, || {
            api.list_objects(prefix, marker.as_deref(), "", MAX_PAGE_SIZE)
        })?;

        for object in output.contents {
            if seen.insert(object.key.clone()) {
                keys.push(object.key);
            }
        }

        if cursor.advance(output.next_marker) {
            break;
        }
    }

    debug!(
        "collected {} keys under {} in {} pages",
        keys.len(),
        prefix,
        cursor.pages()
    );
    Ok(keys)
}

/// Remove every object under `prefix` with one batch call.
///
/// Returns the number of keys removed. An empty prefix namespace is a
/// successful no-op without any delete call.
pub(crate) fn delete_prefix(api: &dyn ObsApi, prefix: &str, policy: &RetryPolicy) -> Result<usize> {
    let keys = collect_keys(api, prefix, policy)?;
    if keys.is_empty() {
        return Ok(0);
    }

    let result = retry::execute(policy, || api.delete_objects(&keys))?;

    if let Some(failed) = result.error.first() {
        return Err(Error::new(
            ErrorKind::Unexpected,
            format!(
                "batch delete failed for {} of {} keys, first: {} ({}: {})",
                result.error.len(),
                keys.len(),
                failed.key,
                failed.code,
                failed.message
            ),
        ));
    }

    Ok(keys.len())
}
