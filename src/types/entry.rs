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

use chrono::DateTime;
use chrono::Utc;

use crate::types::visibility::Visibility;

/// EntryMode represents the mode of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// FILE means the entry is a file, mapped from an object record.
    FILE,
    /// DIR means the entry is a directory, mapped from a common prefix.
    DIR,
    /// Unknown means we don't know the mode of this entry.
    Unknown,
}

impl EntryMode {
    /// Check if this mode is FILE.
    pub fn is_file(self) -> bool {
        self == EntryMode::FILE
    }

    /// Check if this mode is DIR.
    pub fn is_dir(self) -> bool {
        self == EntryMode::DIR
    }
}

/// Metadata carries all known metadata of an entry.
///
/// Entries produced by a listing only carry what the listing API returns:
/// length and modification time for files, nothing for directories. Their
/// visibility is `Unknown` since fetching one ACL per listed object would
/// multiply the remote round trips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    mode: EntryMode,

    content_length: Option<u64>,
    content_type: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    visibility: Visibility,
}

impl Metadata {
    /// Create a new metadata with given mode.
    pub fn new(mode: EntryMode) -> Self {
        Self {
            mode,
            content_length: None,
            content_type: None,
            last_modified: None,
            visibility: Visibility::Unknown,
        }
    }

    /// Mode of this entry.
    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Content length of this entry, in bytes.
    pub fn content_length(&self) -> u64 {
        self.content_length.unwrap_or_default()
    }

    /// Set content length of this entry.
    pub fn with_content_length(mut self, v: u64) -> Self {
        self.content_length = Some(v);
        self
    }

    /// MIME type of this entry, if the service reported one.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Set MIME type of this entry.
    pub fn with_content_type(mut self, v: String) -> Self {
        self.content_type = Some(v);
        self
    }

    /// Last modification time of this entry.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Set last modification time of this entry.
    pub fn with_last_modified(mut self, v: DateTime<Utc>) -> Self {
        self.last_modified = Some(v);
        self
    }

    /// Visibility of this entry.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Set visibility of this entry.
    pub fn with_visibility(mut self, v: Visibility) -> Self {
        self.visibility = v;
        self
    }
}

/// Entry is one item yielded by a listing: a logical path plus its metadata.
///
/// The path is always prefix-free and carries a single leading `/`.
/// Directory paths carry no trailing `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    path: String,
    metadata: Metadata,
}

impl Entry {
    /// Create a new entry with its logical path and metadata.
    pub fn new(path: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    /// The logical path of this entry.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The metadata of this entry.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Consume self to get the path and metadata.
    pub fn into_parts(self) -> (String, Metadata) {
        (self.path, self.metadata)
    }
}
