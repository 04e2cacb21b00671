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

//! Scriptable in-memory [`ObsApi`] for tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;

use crate::raw::api::AccessControlList;
use crate::raw::api::AccessControlPolicy;
use crate::raw::api::Credential;
use crate::raw::api::DeleteObjectsResult;
use crate::raw::api::DeleteObjectsResultDeleted;
use crate::raw::api::Grant;
use crate::raw::api::Grantee;
use crate::raw::api::HeadObjectOutput;
use crate::raw::api::ListObjectsOutput;
use crate::raw::api::ObsApi;
use crate::raw::api::PostSignature;
use crate::raw::api::PutOptions;
use crate::raw::api::Tag;
use crate::raw::api::TagSet;
use crate::raw::api::Tagging;
use crate::types::Error;
use crate::types::ErrorKind;
use crate::types::Result;
use crate::types::ACL_PUBLIC_READ;

type PageFn = Box<dyn Fn(usize) -> Result<ListObjectsOutput> + Send + Sync>;

struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
}

/// MockApi scripts listing pages and probe failures, and keeps a plain
/// in-memory object store for the read/write calls. Everything else is
/// recorded for assertion.
#[derive(Default)]
pub(crate) struct MockApi {
    pages: Mutex<VecDeque<Result<ListObjectsOutput>>>,
    page_fn: Mutex<Option<PageFn>>,
    head_bucket_failures: Mutex<VecDeque<Error>>,
    delete_results: Mutex<VecDeque<DeleteObjectsResult>>,

    objects: Mutex<HashMap<String, StoredObject>>,
    acls: Mutex<HashMap<String, String>>,
    tags: Mutex<HashMap<String, Vec<(String, String)>>>,

    pub head_bucket_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub last_list_max_keys: AtomicUsize,
    pub deleted_batches: Mutex<Vec<Vec<String>>>,
    pub restored: Mutex<Vec<(String, u32)>>,
    pub refreshed: Mutex<Vec<Credential>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next unscripted list call. Pages are consumed
    /// in push order.
    pub fn push_page(&self, page: Result<ListObjectsOutput>) {
        self.pages.lock().unwrap().push_back(page);
    }

    /// Generate pages from the zero-based list-call index once the queue is
    /// empty.
    pub fn set_page_fn<F>(&self, f: F)
    where
        F: Fn(usize) -> Result<ListObjectsOutput> + Send + Sync + 'static,
    {
        *self.page_fn.lock().unwrap() = Some(Box::new(f));
    }

    /// Queue a head-bucket failure. Once the queue drains, probes succeed.
    pub fn fail_head_bucket(&self, err: Error) {
        self.head_bucket_failures.lock().unwrap().push_back(err);
    }

    /// Queue the result of the next batch-delete call, e.g. a partial
    /// failure.
    pub fn fail_next_delete_keys(&self, result: DeleteObjectsResult) {
        self.delete_results.lock().unwrap().push_back(result);
    }

    /// Seed an object directly, bypassing `put_object`.
    #[allow(dead_code)]
    pub fn insert_object(&self, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: None,
            },
        );
    }

    /// Keys currently held by the store, sorted.
    #[allow(dead_code)]
    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The canned ACL last applied to `key`, if any.
    #[allow(dead_code)]
    pub fn acl_of(&self, key: &str) -> Option<String> {
        self.acls.lock().unwrap().get(key).cloned()
    }

    fn not_found(key: &str) -> Error {
        Error::new(ErrorKind::NotFound, "no such key").with_context("key", key)
    }
}

impl ObsApi for MockApi {
    fn head_bucket(&self) -> Result<()> {
        self.head_bucket_calls.fetch_add(1, Ordering::SeqCst);
        match self.head_bucket_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        let objects = self.objects.lock().unwrap();
        let object = objects.get(key).ok_or_else(|| Self::not_found(key))?;
        Ok(HeadObjectOutput {
            content_length: object.body.len() as u64,
            content_type: object.content_type.clone(),
            last_modified: Some(Utc::now()),
            etag: Some("\"mock\"".to_string()),
        })
    }

    fn get_object(&self, key: &str) -> Result<Bytes> {
        let objects = self.objects.lock().unwrap();
        let object = objects.get(key).ok_or_else(|| Self::not_found(key))?;
        Ok(object.body.clone())
    }

    fn get_object_reader(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let body = self.get_object(key)?;
        Ok(Box::new(std::io::Cursor::new(body.to_vec())))
    }

    fn put_object(&self, key: &str, body: Bytes, opts: &PutOptions) -> Result<()> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: opts.content_type.clone(),
            },
        );
        if let Some(acl) = opts.acl {
            self.acls
                .lock()
                .unwrap()
                .insert(key.to_string(), acl.to_string());
        }
        Ok(())
    }

    fn put_object_reader(
        &self,
        key: &str,
        mut body: Box<dyn Read + Send>,
        _size: u64,
        opts: &PutOptions,
    ) -> Result<()> {
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)
            .map_err(|err| Error::new(ErrorKind::Unexpected, "read source failed").set_source(err))?;
        self.put_object(key, Bytes::from(buf), opts)
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        self.acls.lock().unwrap().remove(key);
        self.tags.lock().unwrap().remove(key);
        Ok(())
    }

    fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsResult> {
        self.deleted_batches.lock().unwrap().push(keys.to_vec());

        if let Some(result) = self.delete_results.lock().unwrap().pop_front() {
            return Ok(result);
        }

        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(DeleteObjectsResult {
            deleted: keys
                .iter()
                .map(|key| DeleteObjectsResultDeleted { key: key.clone() })
                .collect(),
            error: vec![],
        })
    }

    fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let source = objects.get(from).ok_or_else(|| Self::not_found(from))?;
        let copy = StoredObject {
            body: source.body.clone(),
            content_type: source.content_type.clone(),
        };
        objects.insert(to.to_string(), copy);
        Ok(())
    }

    fn list_objects(
        &self,
        _prefix: &str,
        _marker: Option<&str>,
        _delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsOutput> {
        let index = self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.last_list_max_keys.store(max_keys, Ordering::SeqCst);

        if let Some(page) = self.pages.lock().unwrap().pop_front() {
            return page;
        }
        if let Some(f) = self.page_fn.lock().unwrap().as_ref() {
            return f(index);
        }
        Ok(ListObjectsOutput::default())
    }

    fn get_object_acl(&self, key: &str) -> Result<AccessControlPolicy> {
        if !self.objects.lock().unwrap().contains_key(key) {
            return Err(Self::not_found(key));
        }

        let grant = match self.acls.lock().unwrap().get(key).map(String::as_str) {
            Some(acl) if acl == ACL_PUBLIC_READ => vec![Grant {
                grantee: Grantee {
                    canned: Some("Everyone".to_string()),
                    ..Default::default()
                },
                permission: "READ".to_string(),
            }],
            _ => vec![],
        };

        Ok(AccessControlPolicy {
            access_control_list: AccessControlList { grant },
        })
    }

    fn set_object_acl(&self, key: &str, acl: &str) -> Result<()> {
        if !self.objects.lock().unwrap().contains_key(key) {
            return Err(Self::not_found(key));
        }
        self.acls
            .lock()
            .unwrap()
            .insert(key.to_string(), acl.to_string());
        Ok(())
    }

    fn get_object_tagging(&self, key: &str) -> Result<Tagging> {
        let tags = self.tags.lock().unwrap();
        let pairs = tags.get(key).cloned().unwrap_or_default();
        Ok(Tagging {
            tag_set: TagSet {
                tag: pairs
                    .into_iter()
                    .map(|(key, value)| Tag { key, value })
                    .collect(),
            },
        })
    }

    fn set_object_tagging(&self, key: &str, tagging: &Tagging) -> Result<()> {
        let pairs = tagging
            .tag_set
            .tag
            .iter()
            .map(|tag| (tag.key.clone(), tag.value.clone()))
            .collect();
        self.tags.lock().unwrap().insert(key.to_string(), pairs);
        Ok(())
    }

    fn delete_object_tagging(&self, key: &str) -> Result<()> {
        self.tags.lock().unwrap().remove(key);
        Ok(())
    }

    fn restore_object(&self, key: &str, days: u32) -> Result<()> {
        self.restored.lock().unwrap().push((key.to_string(), days));
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://bucket.mock.example.com/{key}")
    }

    fn signed_url(&self, method: &str, key: &str, expires_in: Duration) -> Result<String> {
        Ok(format!(
            "https://bucket.mock.example.com/{key}?method={method}&Expires={}",
            expires_in.as_secs()
        ))
    }

    fn post_signature(
        &self,
        _expires_in: Duration,
        _conditions: &[String],
    ) -> Result<PostSignature> {
        Ok(PostSignature {
            policy: "bW9jay1wb2xpY3k=".to_string(),
            signature: "mock-signature".to_string(),
            access_key_id: "mock-ak".to_string(),
        })
    }

    fn refresh_credentials(&self, credential: Credential) {
        self.refreshed.lock().unwrap().push(credential);
    }
}
