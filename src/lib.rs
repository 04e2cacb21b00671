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

//! Filesystem-style access to Huawei Cloud Object Storage Service (OBS).
//!
//! obsfs exposes one OBS bucket, optionally scoped to a key prefix, as a
//! flat filesystem: paths in, paths out, never raw storage keys. On top of
//! the plain read/write surface it carries the pieces object storage makes
//! hard to get right:
//!
//! - Cursor-based listing that always terminates, with per-call budgets for
//!   keys and wall-clock time ([`ListingBudget`]).
//! - Whole-prefix deletion that collects keys across every page and removes
//!   them with a single batch call.
//! - A cached authentication probe in front of every state-sensitive
//!   operation, and bounded exponential-backoff retries for transient
//!   failures.
//! - A two-valued [`Visibility`] abstraction over the remote ACL model.
//!
//! All operations are blocking.
//!
//! # Example
//!
//! ```no_run
//! use obsfs::ListingBudget;
//! use obsfs::ObsBuilder;
//! use obsfs::Result;
//!
//! fn main() -> Result<()> {
//!     let fs = ObsBuilder::default()
//!         .bucket("examplebucket")
//!         .endpoint("obs.cn-north-4.myhuaweicloud.com")
//!         .access_key_id("ak")
//!         .secret_access_key("sk")
//!         .root("/uploads")
//!         .build()?;
//!
//!     fs.write("demo/hello.txt", "Hello, OBS!".into(), &Default::default())?;
//!
//!     for entry in fs.list("demo", true, ListingBudget::new())? {
//!         let entry = entry?;
//!         println!("{} ({} bytes)", entry.path(), entry.metadata().content_length());
//!     }
//!
//!     fs.delete_directory("demo")?;
//!     Ok(())
//! }
//! ```

mod auth;
mod backend;
mod config;
pub mod core;
mod delete;
mod error;
mod lister;
pub mod raw;
mod retry;
#[cfg(test)]
mod test_utils;
mod types;

pub use auth::DEFAULT_AUTH_CACHE_TTL;
pub use backend::ObsBackend;
pub use backend::ObsBuilder;
pub use backend::WriteOptions;
pub use config::ObsConfig;
pub use lister::Lister;
pub use raw::api::Credential;
pub use raw::api::PostSignature;
pub use retry::RetryPolicy;
pub use types::Entry;
pub use types::EntryMode;
pub use types::Error;
pub use types::ErrorKind;
pub use types::ListingBudget;
pub use types::Metadata;
pub use types::Result;
pub use types::Visibility;
pub use types::DEFAULT_MAX_ITERATIONS;
pub use types::MAX_PAGE_SIZE;
