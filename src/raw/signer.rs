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

//! OBS signature v1 (HMAC-SHA1) for header, query and post-policy signing.
//!
//! The canonicalized resource starts with the bucket name for default
//! `obs.<region>.myhuaweicloud.com` domains, or with the user domain when the
//! bucket is bound to one:
//! <https://support.huaweicloud.com/intl/en-us/api-obs/obs_04_0010.html>

use std::collections::BTreeMap;

use base64::engine::general_purpose;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use sha1::Sha1;

use crate::raw::api::Credential;

type HmacSha1 = Hmac<Sha1>;

/// Signer computes OBS v1 signatures.
#[derive(Clone, Debug)]
pub struct Signer {
    /// The bucket name, or the user domain bound to the bucket.
    resource: String,
}

impl Signer {
    /// Create a signer. `resource` is the bucket name for default domains,
    /// or the user domain for custom ones.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }

    /// Build the canonicalized resource for a key and optional subresource,
    /// e.g. `/bucket/dir/file.txt?acl`.
    pub fn canonical_resource(&self, key: &str, subresource: Option<&str>) -> String {
        let mut resource = format!("/{}/{}", self.resource, key);
        if let Some(sub) = subresource {
            resource.push('?');
            resource.push_str(sub);
        }
        resource
    }

    /// The `Authorization` header value for a request.
    ///
    /// `obs_headers` must hold all `x-obs-*` headers with lowercased names;
    /// the BTreeMap keeps them in the sorted order canonicalization requires.
    pub fn authorization(
        &self,
        credential: &Credential,
        method: &str,
        content_md5: &str,
        content_type: &str,
        date: &str,
        obs_headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> String {
        let sts = string_to_sign(method, content_md5, content_type, date, obs_headers, resource);
        let signature = hmac_b64(credential.secret_access_key.as_bytes(), sts.as_bytes());
        format!("OBS {}:{}", credential.access_key_id, signature)
    }

    /// The signature for a query-signed URL. `expires` is the epoch-seconds
    /// deadline and takes the place of the `Date` field.
    pub fn query_signature(
        &self,
        credential: &Credential,
        method: &str,
        expires: &str,
        obs_headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> String {
        let sts = string_to_sign(method, "", "", expires, obs_headers, resource);
        hmac_b64(credential.secret_access_key.as_bytes(), sts.as_bytes())
    }

    /// Sign a base64-encoded post policy document.
    pub fn sign_policy(&self, credential: &Credential, policy: &str) -> String {
        hmac_b64(credential.secret_access_key.as_bytes(), policy.as_bytes())
    }
}

fn string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    obs_headers: &BTreeMap<String, String>,
    resource: &str,
) -> String {
    let mut sts = format!("{method}\n{content_md5}\n{content_type}\n{date}\n");
    for (name, value) in obs_headers {
        sts.push_str(name);
        sts.push(':');
        sts.push_str(value);
        sts.push('\n');
    }
    sts.push_str(resource);
    sts
}

fn hmac_b64(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any size");
    mac.update(data);
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
