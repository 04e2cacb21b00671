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

//! The pagination engine.
//!
//! [`Lister`] drives the cursor-based list-objects API to completion (or a
//! caller-specified budget) and yields entries lazily. The remote listing is
//! eventually consistent and not a snapshot, so the engine defends itself:
//! keys already emitted in this call are suppressed, a repeated non-null
//! marker ends the stream silently, and a remote that never stops handing
//! out fresh markers trips the iteration ceiling.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;

use crate::raw::api::ObsApi;
use crate::raw::path::build_logical_path;
use crate::retry;
use crate::retry::RetryPolicy;
use crate::types::Entry;
use crate::types::EntryMode;
use crate::types::Error;
use crate::types::ErrorKind;
use crate::types::ListingBudget;
use crate::types::Metadata;
use crate::types::Result;

/// One step of a cursor walk.
pub(crate) enum Turn {
    /// Fetch the next page at the current marker.
    Fetch,
    /// The walk is over; not an error.
    Stop,
}

/// Cursor state shared by every paginated walk: the listing engine and the
/// keys-only walk the bulk deleter runs.
///
/// The marker is an explicit `Option` so "no token yet" can never be
/// mistaken for an empty-string token.
pub(crate) struct CursorState {
    marker: Option<String>,
    prev_marker: Option<String>,
    pages: usize,
    max_iterations: usize,
}

impl CursorState {
    pub(crate) fn new(max_iterations: usize) -> Self {
        Self {
            marker: None,
            prev_marker: None,
            pages: 0,
            max_iterations,
        }
    }

    /// The marker to fetch the next page at.
    pub(crate) fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// How many pages have been fetched.
    pub(crate) fn pages(&self) -> usize {
        self.pages
    }

    /// Safety checks before fetching a page.
    ///
    /// A marker identical to the previous one means the remote is looping;
    /// we treat that as end-of-stream. A walk past the iteration ceiling is
    /// a genuine error.
    pub(crate) fn check(&mut self) -> Result<Turn> {
        if self.pages >= self.max_iterations {
            return Err(Error::new(
                ErrorKind::PaginationExhausted,
                format!(
                    "listing did not terminate within {} pages",
                    self.max_iterations
                ),
            ));
        }

        if self.marker.is_some() && self.marker == self.prev_marker {
            return Ok(Turn::Stop);
        }

        self.pages += 1;
        Ok(Turn::Fetch)
    }

    /// Advance to the next page's marker. Returns `true` when the walk is
    /// done: absent marker is the normal terminus, a marker equal to the
    /// current one is the loop guard.
    pub(crate) fn advance(&mut self, next: Option<String>) -> bool {
        let next = next.filter(|v| !v.is_empty());

        match next {
            None => true,
            Some(next) => {
                if self.marker.as_deref() == Some(next.as_str()) {
                    return true;
                }
                self.prev_marker = std::mem::replace(&mut self.marker, Some(next));
                false
            }
        }
    }
}

/// Lister is a lazy sequence of [`Entry`] produced by one listing call.
///
/// No work is done ahead of consumption: a caller who stops pulling never
/// triggers a page fetch beyond what was needed. The sequence is not
/// restartable; a fresh call re-walks from the beginning.
pub struct Lister {
    api: Arc<dyn ObsApi>,
    root: String,
    prefix: String,
    delimiter: &'static str,
    budget: ListingBudget,
    retry: Option<RetryPolicy>,

    started_at: Instant,
    cursor: CursorState,
    seen: HashSet<String>,
    buffer: VecDeque<Entry>,
    emitted: usize,
    done: bool,
}

impl Lister {
    pub(crate) fn new(
        api: Arc<dyn ObsApi>,
        root: String,
        prefix: String,
        recursive: bool,
        budget: ListingBudget,
        retry: Option<RetryPolicy>,
    ) -> Self {
        let delimiter = if recursive { "" } else { "/" };

        Self {
            api,
            root,
            prefix,
            delimiter,
            budget,
            retry,
            started_at: Instant::now(),
            cursor: CursorState::new(budget.max_iterations()),
            seen: HashSet::new(),
            buffer: VecDeque::new(),
            emitted: 0,
            done: false,
        }
    }

    /// Fetch one page into the buffer, honoring the budget and the cursor
    /// guards. Sets `done` when the walk is over.
    fn next_page(&mut self) -> Result<()> {
        let timeout = self.budget.timeout();
        if !timeout.is_zero() && self.started_at.elapsed() >= timeout {
            self.done = true;
            return Ok(());
        }

        match self.cursor.check()? {
            Turn::Stop => {
                self.done = true;
                return Ok(());
            }
            Turn::Fetch => {}
        }

        let max_keys = self.budget.page_size(self.emitted);
        let output = {
            let api = self.api.as_ref();
            let prefix = self.prefix.as_str();
            let marker = self.cursor.marker();
            let delimiter = self.delimiter;

            let fetch = || api.list_objects(prefix, marker, delimiter, max_keys);
            match &self.retry {
                Some(policy) => retry::execute(policy, fetch),
                None => fetch(),
            }
        }
        .map_err(|err| {
            err.with_operation("Lister::next_page")
                .with_context("prefix", &self.prefix)
        })?;

        for object in output.contents {
            // The marker object of the listed directory itself is not an
            // entry of that directory.
            if object.key == self.prefix {
                continue;
            }
            if !self.seen.insert(object.key.clone()) {
                continue;
            }

            let path = build_logical_path(&self.root, &object.key);
            let last_modified = object
                .last_modified
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now);
            let metadata = Metadata::new(EntryMode::FILE)
                .with_content_length(object.size)
                .with_last_modified(last_modified);

            self.buffer.push_back(Entry::new(path, metadata));
            self.emitted += 1;
            if self.budget.keys_exhausted(self.emitted) {
                self.done = true;
                return Ok(());
            }
        }

        for prefix in output.common_prefixes {
            if !self.seen.insert(prefix.prefix.clone()) {
                continue;
            }

            let path = build_logical_path(&self.root, prefix.prefix.trim_end_matches('/'));
            self.buffer
                .push_back(Entry::new(path, Metadata::new(EntryMode::DIR)));
            self.emitted += 1;
            if self.budget.keys_exhausted(self.emitted) {
                self.done = true;
                return Ok(());
            }
        }

        if self.cursor.advance(output.next_marker) {
            self.done = true;
        }

        Ok(())
    }
}

impl Iterator for Lister {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if self.done {
                return None;
            }

            if let Err(err) = self.next_page() {
                // Entries already emitted are not retracted; the sequence
                // simply ends with this error.
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

fn parse_timestamp(v: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(v)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::raw::api::ListObjectsOutput;
    use crate::raw::api::ListObjectsOutputContent;
    use crate::raw::api::OutputCommonPrefix;
    use crate::test_utils::MockApi;

    fn object(key: &str, size: u64) -> ListObjectsOutputContent {
        ListObjectsOutputContent {
            key: key.to_string(),
            size,
            last_modified: Some("2024-05-01T12:00:00.000Z".to_string()),
            etag: None,
        }
    }

    fn page(
        contents: Vec<ListObjectsOutputContent>,
        prefixes: Vec<&str>,
        next_marker: Option<&str>,
    ) -> ListObjectsOutput {
        ListObjectsOutput {
            is_truncated: Some(next_marker.is_some()),
            next_marker: next_marker.map(str::to_string),
            common_prefixes: prefixes
                .into_iter()
                .map(|p| OutputCommonPrefix {
                    prefix: p.to_string(),
                })
                .collect(),
            contents,
        }
    }

    fn lister(api: &Arc<MockApi>, prefix: &str, budget: ListingBudget) -> Lister {
        Lister::new(
            api.clone() as Arc<dyn ObsApi>,
            "/".to_string(),
            prefix.to_string(),
            true,
            budget,
            None,
        )
    }

    #[test]
    fn test_terminates_and_emits_union_of_pages() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(
            vec![object("dir/", 0), object("dir/a.txt", 1)],
            vec![],
            Some("dir/a.txt"),
        )));
        // Overlapping page: a.txt comes back again.
        api.push_page(Ok(page(
            vec![object("dir/a.txt", 1), object("dir/b.txt", 2)],
            vec![],
            None,
        )));

        let entries: Vec<Entry> = lister(&api, "dir/", ListingBudget::new())
            .collect::<Result<_>>()
            .unwrap();

        // The marker key itself is suppressed, the duplicate is suppressed.
        let paths: Vec<&str> = entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["/dir/a.txt", "/dir/b.txt"]);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_common_prefixes_become_directories() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(
            vec![object("dir/a.txt", 1)],
            vec!["dir/sub/"],
            None,
        )));

        let entries: Vec<Entry> = lister(&api, "dir/", ListingBudget::new())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path(), "/dir/a.txt");
        assert!(entries[0].metadata().mode().is_file());
        // Trailing separator is trimmed on directory paths.
        assert_eq!(entries[1].path(), "/dir/sub");
        assert!(entries[1].metadata().mode().is_dir());
    }

    #[test]
    fn test_loop_guard_stops_without_error() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(vec![object("dir/a.txt", 1)], vec![], Some("m1"))));
        api.push_page(Ok(page(vec![object("dir/b.txt", 1)], vec![], Some("m1"))));
        // A third page would be a bug; the mock would return c.txt.
        api.push_page(Ok(page(vec![object("dir/c.txt", 1)], vec![], None)));

        let entries: Vec<Entry> = lister(&api, "dir/", ListingBudget::new())
            .collect::<Result<_>>()
            .unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["/dir/a.txt", "/dir/b.txt"]);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_iteration_ceiling_raises() {
        let api = Arc::new(MockApi::new());
        // A remote that never stops handing out fresh markers.
        api.set_page_fn(|i| {
            Ok(ListObjectsOutput {
                is_truncated: Some(true),
                next_marker: Some(format!("marker-{i}")),
                common_prefixes: vec![],
                contents: vec![],
            })
        });

        let mut lister = lister(&api, "dir/", ListingBudget::new());
        let err = lister
            .find_map(|res| res.err())
            .expect("listing must fail");

        assert_eq!(err.kind(), ErrorKind::PaginationExhausted);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_key_budget_stops_mid_page() {
        let api = Arc::new(MockApi::new());
        let contents = (0..10).map(|i| object(&format!("dir/{i}.txt"), 1)).collect();
        api.push_page(Ok(page(contents, vec![], Some("dir/9.txt"))));

        let entries: Vec<Entry> = lister(&api, "dir/", ListingBudget::new().with_max_keys(5))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 5);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_page_size_respects_remaining_budget() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(vec![object("dir/a.txt", 1)], vec![], None)));

        let entries: Vec<Entry> = lister(&api, "dir/", ListingBudget::new().with_max_keys(7))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(api.last_list_max_keys.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_timeout_checked_at_page_boundary() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(vec![object("dir/a.txt", 1)], vec![], Some("m1"))));
        api.push_page(Ok(page(vec![object("dir/b.txt", 1)], vec![], None)));

        let mut lister = lister(
            &api,
            "dir/",
            ListingBudget::new().with_timeout(Duration::from_millis(5)),
        );
        // Pull the first entry, then outlive the time budget.
        let first = lister.next().expect("first entry").unwrap();
        assert_eq!(first.path(), "/dir/a.txt");
        std::thread::sleep(Duration::from_millis(10));

        // The timeout ends the sequence silently at the next page boundary.
        assert!(lister.next().is_none());
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_failure_ends_sequence_with_error() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(vec![object("dir/a.txt", 1)], vec![], Some("m1"))));
        api.push_page(Err(Error::new(ErrorKind::Unexpected, "connection reset")));

        let mut lister = lister(&api, "dir/", ListingBudget::new());
        assert!(lister.next().unwrap().is_ok());
        assert!(lister.next().unwrap().is_err());
        assert!(lister.next().is_none());
    }

    #[test]
    fn test_prefix_mapping_of_results() {
        let api = Arc::new(MockApi::new());
        api.push_page(Ok(page(vec![object("uploads/sub/f.txt", 3)], vec![], None)));

        let entries: Vec<Entry> = Lister::new(
            api.clone() as Arc<dyn ObsApi>,
            "/uploads/".to_string(),
            "uploads/".to_string(),
            true,
            ListingBudget::new(),
            None,
        )
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(entries[0].path(), "/sub/f.txt");
    }

    #[test]
    fn test_cursor_state_loop_guard_before_fetch() {
        let mut cursor = CursorState::new(10);
        assert!(matches!(cursor.check().unwrap(), Turn::Fetch));
        assert!(!cursor.advance(Some("m1".to_string())));
        assert!(matches!(cursor.check().unwrap(), Turn::Fetch));
        // The remote repeats the marker: terminal, not an error.
        assert!(cursor.advance(Some("m1".to_string())));
        assert_eq!(cursor.pages(), 2);
    }

    #[test]
    fn test_cursor_state_empty_marker_is_end_of_stream() {
        let mut cursor = CursorState::new(10);
        assert!(matches!(cursor.check().unwrap(), Turn::Fetch));
        assert!(cursor.advance(Some(String::new())));
    }
}
