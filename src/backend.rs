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

//! The filesystem-style facade over one OBS bucket.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::warn;

use crate::auth::AuthCache;
use crate::auth::DEFAULT_AUTH_CACHE_TTL;
use crate::config::ObsConfig;
use crate::core::ObsCore;
use crate::delete;
use crate::lister::Lister;
use crate::raw::api::Credential;
use crate::raw::api::ObsApi;
use crate::raw::api::PostSignature;
use crate::raw::api::PutOptions;
use crate::raw::api::Tag;
use crate::raw::api::TagSet;
use crate::raw::api::Tagging;
use crate::raw::path::build_abs_path;
use crate::raw::path::normalize_path;
use crate::raw::path::normalize_root;
use crate::retry;
use crate::retry::RetryPolicy;
use crate::types::Error;
use crate::types::ErrorKind;
use crate::types::EntryMode;
use crate::types::ListingBudget;
use crate::types::Metadata;
use crate::types::Result;
use crate::types::Visibility;

/// Options applied to a write.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Visibility the new object gets. `None` keeps the bucket default.
    pub visibility: Option<Visibility>,
    /// MIME type of the new object.
    pub content_type: Option<String>,
}

impl WriteOptions {
    fn to_put_options(&self) -> PutOptions {
        PutOptions {
            content_type: self.content_type.clone(),
            acl: self.visibility.map(|v| v.into_acl()),
        }
    }
}

/// Builder for [`ObsBackend`].
///
/// Setters taking strings ignore empty values, so a builder can be fed
/// straight from optional environment lookups.
#[derive(Default, Clone, Debug)]
pub struct ObsBuilder {
    config: ObsConfig,
    http_client: Option<reqwest::blocking::Client>,
}

impl ObsBuilder {
    /// Create a builder from a deserialized config.
    pub fn from_config(config: ObsConfig) -> Self {
        Self {
            config,
            http_client: None,
        }
    }

    /// Reuse a caller-provided HTTP client instead of building one, e.g. to
    /// set timeouts or share a connection pool.
    pub fn http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the key prefix applied to every logical path.
    pub fn root(mut self, root: &str) -> Self {
        self.config.root = if root.is_empty() {
            None
        } else {
            Some(root.to_string())
        };
        self
    }

    /// Set the endpoint of this backend, e.g.
    /// `obs.cn-north-4.myhuaweicloud.com` or a user domain bound to the
    /// bucket.
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        if !endpoint.is_empty() {
            self.config.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        }
        self
    }

    /// Set the access key id.
    pub fn access_key_id(mut self, access_key_id: &str) -> Self {
        if !access_key_id.is_empty() {
            self.config.access_key_id = Some(access_key_id.to_string());
        }
        self
    }

    /// Set the secret access key.
    pub fn secret_access_key(mut self, secret_access_key: &str) -> Self {
        if !secret_access_key.is_empty() {
            self.config.secret_access_key = Some(secret_access_key.to_string());
        }
        self
    }

    /// Set the security token of temporary credentials.
    pub fn security_token(mut self, security_token: &str) -> Self {
        if !security_token.is_empty() {
            self.config.security_token = Some(security_token.to_string());
        }
        self
    }

    /// Set the bucket name.
    pub fn bucket(mut self, bucket: &str) -> Self {
        if !bucket.is_empty() {
            self.config.bucket = Some(bucket.to_string());
        }
        self
    }

    /// How many attempts one remote call gets before its failure surfaces.
    pub fn retry_max_attempts(mut self, v: usize) -> Self {
        self.config.retry_max_attempts = Some(v);
        self
    }

    /// Base delay of the exponential backoff between attempts.
    pub fn retry_base_delay(mut self, v: Duration) -> Self {
        self.config.retry_base_delay_secs = Some(v.as_secs());
        self
    }

    /// How long a successful liveness probe stays cached.
    pub fn auth_cache_ttl(mut self, v: Duration) -> Self {
        self.config.auth_cache_ttl_secs = Some(v.as_secs());
        self
    }

    /// Turn on adapter logging: operations at debug level, failures at warn.
    pub fn enable_logging(mut self) -> Self {
        self.config.logging_enabled = true;
        self.config.log_operations = true;
        self.config.log_errors = true;
        self
    }

    /// Consume the builder to build a backend.
    pub fn build(self) -> Result<ObsBackend> {
        debug!("backend build started: {:?}", self.config);

        let root = normalize_root(&self.config.root.unwrap_or_default());

        let bucket = match self.config.bucket.filter(|v| !v.is_empty()) {
            Some(bucket) => bucket,
            None => {
                return Err(
                    Error::new(ErrorKind::ConfigInvalid, "bucket is empty")
                        .with_operation("Builder::build")
                        .with_context("service", "obs"),
                )
            }
        };
        let endpoint = match self.config.endpoint.filter(|v| !v.is_empty()) {
            Some(endpoint) => endpoint,
            None => {
                return Err(
                    Error::new(ErrorKind::ConfigInvalid, "endpoint is empty")
                        .with_operation("Builder::build")
                        .with_context("service", "obs"),
                )
            }
        };
        let (access_key_id, secret_access_key) = match (
            self.config.access_key_id.filter(|v| !v.is_empty()),
            self.config.secret_access_key.filter(|v| !v.is_empty()),
        ) {
            (Some(ak), Some(sk)) => (ak, sk),
            _ => {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "access_key_id and secret_access_key are required",
                )
                .with_operation("Builder::build")
                .with_context("service", "obs"))
            }
        };

        let credential = Credential {
            access_key_id,
            secret_access_key,
            security_token: self.config.security_token.filter(|v| !v.is_empty()),
        };
        let core = match self.http_client {
            Some(client) => ObsCore::with_client(&bucket, &endpoint, credential, client)?,
            None => ObsCore::new(&bucket, &endpoint, credential)?,
        };

        let retry = RetryPolicy::new(
            self.config.retry_max_attempts.unwrap_or(3),
            Duration::from_secs(self.config.retry_base_delay_secs.unwrap_or(1)),
        );
        let auth_ttl = self
            .config
            .auth_cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AUTH_CACHE_TTL);

        debug!("backend build finished: bucket={bucket} root={root}");

        Ok(ObsBackend {
            api: Arc::new(core),
            root,
            retry,
            auth: AuthCache::new(auth_ttl),
            log_operations: self.config.logging_enabled && self.config.log_operations,
            log_errors: self.config.logging_enabled && self.config.log_errors,
        })
    }
}

/// ObsBackend exposes one OBS bucket (optionally scoped to a key prefix) as
/// a flat filesystem.
///
/// Every caller-facing path is logical: prefix-free, `/`-separated. The
/// backend maps them onto storage keys on the way out and strips the prefix
/// again on the way back, so callers never observe raw keys.
///
/// All state-sensitive operations go through a cached authentication probe
/// and a bounded retry wrapper.
pub struct ObsBackend {
    api: Arc<dyn ObsApi>,
    root: String,
    retry: RetryPolicy,
    auth: AuthCache,
    log_operations: bool,
    log_errors: bool,
}

impl std::fmt::Debug for ObsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObsBackend")
            .field("root", &self.root)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ObsBackend {
    #[cfg(test)]
    pub(crate) fn with_api(api: Arc<dyn ObsApi>, root: &str) -> Self {
        Self {
            api,
            root: normalize_root(root),
            retry: RetryPolicy::new(1, Duration::ZERO),
            auth: AuthCache::new(DEFAULT_AUTH_CACHE_TTL),
            log_operations: false,
            log_errors: false,
        }
    }

    /// The storage key of a logical file path.
    fn key(&self, path: &str) -> String {
        build_abs_path(&self.root, &normalize_path(path))
    }

    /// The storage key prefix of a logical directory path, always ending
    /// with `/` (or empty for the root of an unprefixed bucket).
    fn dir_key(&self, path: &str) -> String {
        let mut p = normalize_path(path);
        if p != "/" && !p.ends_with('/') {
            p.push('/');
        }
        build_abs_path(&self.root, &p)
    }

    /// The gate every state-sensitive operation passes: log, authenticate,
    /// retry, decorate failures.
    fn run<T>(&self, op: &'static str, path: &str, f: impl FnMut() -> Result<T>) -> Result<T> {
        if self.log_operations {
            debug!("{op}: path={path}");
        }

        self.auth
            .ensure(self.api.as_ref(), &self.retry)
            .and_then(|()| retry::execute(&self.retry, f))
            .map_err(|err| {
                let err = err.with_operation(op).with_context("path", path);
                if self.log_errors {
                    warn!("{err}");
                }
                err
            })
    }

    /// Like [`run`](Self::run) but without the retry wrapper, for calls that
    /// consume a one-shot resource such as a streaming body.
    fn run_once<T>(&self, op: &'static str, path: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if self.log_operations {
            debug!("{op}: path={path}");
        }

        self.auth
            .ensure(self.api.as_ref(), &self.retry)
            .and_then(|()| f())
            .map_err(|err| {
                let err = err.with_operation(op).with_context("path", path);
                if self.log_errors {
                    warn!("{err}");
                }
                err
            })
    }

    /// Whether a file exists. A missing object is `false`, not an error.
    pub fn file_exists(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        match self.run("file_exists", path, || self.api.head_object(&key)) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether a directory exists, i.e. whether anything lives under its
    /// prefix.
    pub fn directory_exists(&self, path: &str) -> Result<bool> {
        let prefix = self.dir_key(path);
        let output = self.run("directory_exists", path, || {
            self.api.list_objects(&prefix, None, "/", 1)
        })?;
        Ok(!output.contents.is_empty() || !output.common_prefixes.is_empty())
    }

    /// Write a whole object.
    pub fn write(&self, path: &str, content: Bytes, opts: &WriteOptions) -> Result<()> {
        let key = self.key(path);
        let put_opts = opts.to_put_options();
        self.run("write", path, || {
            self.api.put_object(&key, content.clone(), &put_opts)
        })
    }

    /// Write an object from a reader with a known length.
    ///
    /// The body can only be consumed once, so this path is not retried.
    pub fn write_stream(
        &self,
        path: &str,
        body: Box<dyn Read + Send>,
        size: u64,
        opts: &WriteOptions,
    ) -> Result<()> {
        let key = self.key(path);
        let put_opts = opts.to_put_options();
        self.run_once("write_stream", path, || {
            self.api.put_object_reader(&key, body, size, &put_opts)
        })
    }

    /// Read a whole object into memory.
    pub fn read(&self, path: &str) -> Result<Bytes> {
        let key = self.key(path);
        self.run("read", path, || self.api.get_object(&key))
    }

    /// Open a streaming reader over an object body.
    pub fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let key = self.key(path);
        self.run("read_stream", path, || self.api.get_object_reader(&key))
    }

    /// Delete a file. Deleting a missing file succeeds.
    pub fn delete(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        self.run("delete", path, || self.api.delete_object(&key))
    }

    /// Delete a directory and everything under it. Returns how many objects
    /// were removed; an empty directory is a successful no-op.
    pub fn delete_directory(&self, path: &str) -> Result<usize> {
        if self.log_operations {
            debug!("delete_directory: path={path}");
        }

        let prefix = self.dir_key(path);
        self.auth
            .ensure(self.api.as_ref(), &self.retry)
            .and_then(|()| delete::delete_prefix(self.api.as_ref(), &prefix, &self.retry))
            .map_err(|err| {
                let err = err.with_operation("delete_directory").with_context("path", path);
                if self.log_errors {
                    warn!("{err}");
                }
                err
            })
    }

    /// Create a directory by writing its zero-byte marker object.
    pub fn create_directory(&self, path: &str) -> Result<()> {
        let key = self.dir_key(path);
        self.run("create_directory", path, || {
            self.api
                .put_object(&key, Bytes::new(), &PutOptions::default())
        })
    }

    /// Full metadata of a file.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let key = self.key(path);
        let output = self.run("stat", path, || self.api.head_object(&key))?;

        let mut metadata =
            Metadata::new(EntryMode::FILE).with_content_length(output.content_length);
        if let Some(content_type) = output.content_type {
            metadata = metadata.with_content_type(content_type);
        }
        if let Some(last_modified) = output.last_modified {
            metadata = metadata.with_last_modified(last_modified);
        }
        Ok(metadata)
    }

    /// Size of a file, in bytes.
    pub fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self.stat(path)?.content_length())
    }

    /// MIME type of a file, if the service reported one.
    pub fn mime_type(&self, path: &str) -> Result<Option<String>> {
        Ok(self.stat(path)?.content_type().map(str::to_string))
    }

    /// Last modification time of a file.
    pub fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.stat(path)?.last_modified())
    }

    /// Visibility of a file, derived from its grant list.
    pub fn visibility(&self, path: &str) -> Result<Visibility> {
        let key = self.key(path);
        let policy = self.run("visibility", path, || self.api.get_object_acl(&key))?;
        Ok(policy.visibility())
    }

    /// Replace a file's ACL with the canned one matching `visibility`.
    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let key = self.key(path);
        let acl = visibility.into_acl();
        self.run("set_visibility", path, || self.api.set_object_acl(&key, acl))
    }

    /// Server-side copy. The source must exist; the target is overwritten.
    pub fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from_key = self.key(from);
        let to_key = self.key(to);
        self.run("copy", from, || self.api.copy_object(&from_key, &to_key))
    }

    /// Move a file: copy then delete the source.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to)?;
        self.delete(from)
    }

    /// List a directory lazily.
    ///
    /// `recursive` flattens all nesting; otherwise deeper levels come back
    /// as single directory entries. Pages are fetched as the returned
    /// iterator is pulled.
    pub fn list(&self, path: &str, recursive: bool, budget: ListingBudget) -> Result<Lister> {
        if self.log_operations {
            debug!("list: path={path} recursive={recursive}");
        }

        self.auth
            .ensure(self.api.as_ref(), &self.retry)
            .map_err(|err| err.with_operation("list").with_context("path", path))?;

        Ok(Lister::new(
            self.api.clone(),
            self.root.clone(),
            self.dir_key(path),
            recursive,
            budget,
            Some(self.retry),
        ))
    }

    /// The direct, unsigned endpoint URL of a file. Only useful for public
    /// objects.
    pub fn url(&self, path: &str) -> String {
        self.api.object_url(&self.key(path))
    }

    /// A time-limited signed URL for a file.
    pub fn signed_url(&self, method: &str, path: &str, expires_in: Duration) -> Result<String> {
        let key = self.key(path);
        self.api
            .signed_url(method, &key, expires_in)
            .map_err(|err| err.with_operation("signed_url").with_context("path", path))
    }

    /// A policy + signature pair for browser-based form uploads.
    pub fn post_signature(
        &self,
        expires_in: Duration,
        conditions: &[String],
    ) -> Result<PostSignature> {
        self.api
            .post_signature(expires_in, conditions)
            .map_err(|err| err.with_operation("post_signature"))
    }

    /// The tag set of a file, as key/value pairs.
    pub fn tags(&self, path: &str) -> Result<Vec<(String, String)>> {
        let key = self.key(path);
        let tagging = self.run("tags", path, || self.api.get_object_tagging(&key))?;
        Ok(tagging
            .tag_set
            .tag
            .into_iter()
            .map(|tag| (tag.key, tag.value))
            .collect())
    }

    /// Replace the tag set of a file.
    pub fn set_tags(&self, path: &str, tags: &[(String, String)]) -> Result<()> {
        let key = self.key(path);
        let tagging = Tagging {
            tag_set: TagSet {
                tag: tags
                    .iter()
                    .map(|(k, v)| Tag {
                        key: k.clone(),
                        value: v.clone(),
                    })
                    .collect(),
            },
        };
        self.run("set_tags", path, || {
            self.api.set_object_tagging(&key, &tagging)
        })
    }

    /// Remove all tags from a file.
    pub fn delete_tags(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        self.run("delete_tags", path, || self.api.delete_object_tagging(&key))
    }

    /// Restore an archived file for `days` days.
    pub fn restore(&self, path: &str, days: u32) -> Result<()> {
        let key = self.key(path);
        self.run("restore", path, || self.api.restore_object(&key, days))
    }

    /// Swap the credential set and drop the cached authentication state, so
    /// the next operation probes with the new credentials.
    pub fn refresh_credentials(&self, credential: Credential) {
        self.api.refresh_credentials(credential);
        self.auth.invalidate();
    }
}
