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

//! The production [`ObsApi`] implementation over HTTP.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::RwLock;
use std::time::Duration;

use bytes::Buf;
use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use log::debug;
use percent_encoding::utf8_percent_encode;
use percent_encoding::NON_ALPHANUMERIC;
use quick_xml::de;
use quick_xml::se;
use reqwest::blocking::Body;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_LENGTH;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::DATE;
use reqwest::header::ETAG;
use reqwest::header::LAST_MODIFIED;
use reqwest::Method;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::parse_error;
use crate::raw::api::AccessControlPolicy;
use crate::raw::api::Credential;
use crate::raw::api::DeleteObjectsRequest;
use crate::raw::api::DeleteObjectsRequestObject;
use crate::raw::api::DeleteObjectsResult;
use crate::raw::api::HeadObjectOutput;
use crate::raw::api::ListObjectsOutput;
use crate::raw::api::ObsApi;
use crate::raw::api::PostSignature;
use crate::raw::api::PutOptions;
use crate::raw::api::Tagging;
use crate::raw::http_util::format_content_md5;
use crate::raw::http_util::percent_encode_path;
use crate::raw::signer::Signer;
use crate::types::Error;
use crate::types::ErrorKind;
use crate::types::Result;

/// Header carrying the temporary-credential security token.
const X_OBS_SECURITY_TOKEN: &str = "x-obs-security-token";

/// The HTTP date layout OBS signs, e.g. `Sat, 12 Oct 2024 08:12:38 GMT`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Serialize)]
#[serde(rename = "RestoreRequest", rename_all = "PascalCase")]
struct RestoreRequest {
    days: u32,
}

/// ObsCore speaks the OBS REST dialect: v1-signed requests, XML bodies, and
/// the error format [`parse_error`] understands.
///
/// Credentials live behind a lock so they can be swapped at runtime without
/// rebuilding the client.
#[derive(Debug)]
pub struct ObsCore {
    client: Client,
    bucket: String,
    /// Full scheme-qualified base URL of the bucket, virtual-host style for
    /// default OBS domains.
    endpoint: String,
    signer: Signer,
    credential: RwLock<Credential>,
}

impl ObsCore {
    /// Create a client for one bucket.
    ///
    /// `endpoint` may carry a scheme; `https` is assumed otherwise. Default
    /// `obs.<region>.myhuaweicloud.com` endpoints are turned into
    /// virtual-host form and signed against the bucket name; any other host
    /// is treated as a user domain already bound to the bucket.
    pub fn new(bucket: &str, endpoint: &str, credential: Credential) -> Result<Self> {
        let client = Client::builder().build().map_err(|err| {
            Error::new(ErrorKind::Unexpected, "building http client failed")
                .with_operation("ObsCore::new")
                .set_source(err)
        })?;
        Self::with_client(bucket, endpoint, credential, client)
    }

    /// Like [`new`](Self::new) but reusing a caller-provided HTTP client,
    /// e.g. one with custom timeouts or a shared connection pool.
    pub fn with_client(
        bucket: &str,
        endpoint: &str,
        credential: Credential,
        client: Client,
    ) -> Result<Self> {
        if bucket.is_empty() {
            return Err(Error::new(ErrorKind::ConfigInvalid, "bucket is empty")
                .with_operation("ObsCore::new"));
        }

        let endpoint = endpoint.trim_end_matches('/');
        let (scheme, host) = match endpoint.split_once("://") {
            Some((scheme, host)) => (scheme, host),
            None => ("https", endpoint),
        };
        if host.is_empty() {
            return Err(Error::new(ErrorKind::ConfigInvalid, "endpoint is empty")
                .with_operation("ObsCore::new")
                .with_context("bucket", bucket));
        }

        let is_default_domain = host.starts_with("obs.") && host.ends_with(".myhuaweicloud.com");
        let (endpoint, resource) = if is_default_domain {
            (format!("{scheme}://{bucket}.{host}"), bucket.to_string())
        } else {
            (format!("{scheme}://{host}"), host.to_string())
        };

        debug!("backend use bucket {bucket}, endpoint {endpoint}");

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            endpoint,
            signer: Signer::new(resource),
            credential: RwLock::new(credential),
        })
    }

    fn credential(&self) -> Credential {
        self.credential
            .read()
            .expect("credential lock poisoned")
            .clone()
    }

    fn object_uri(&self, key: &str, subresource: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.endpoint, percent_encode_path(key));
        if let Some(sub) = subresource {
            url.push('?');
            url.push_str(sub);
        }
        url
    }

    /// Sign and send one request. `obs_headers` must hold lowercased
    /// `x-obs-*` names; the security token is added here.
    #[allow(clippy::too_many_arguments)]
    fn send(
        &self,
        op: &'static str,
        method: Method,
        key: &str,
        subresource: Option<&'static str>,
        query: &[(&'static str, String)],
        mut obs_headers: BTreeMap<String, String>,
        content_type: Option<&str>,
        content_md5: Option<&str>,
        body: Body,
    ) -> Result<Response> {
        let credential = self.credential();
        if let Some(token) = &credential.security_token {
            obs_headers.insert(X_OBS_SECURITY_TOKEN.to_string(), token.clone());
        }

        let date = Utc::now().format(DATE_FORMAT).to_string();
        let resource = self.signer.canonical_resource(key, subresource);
        let authorization = self.signer.authorization(
            &credential,
            method.as_str(),
            content_md5.unwrap_or(""),
            content_type.unwrap_or(""),
            &date,
            &obs_headers,
            &resource,
        );

        let url = self.object_uri(key, subresource);
        let mut req = self
            .client
            .request(method, &url)
            .header(DATE, date.as_str())
            .header(AUTHORIZATION, authorization.as_str());
        if !query.is_empty() {
            req = req.query(query);
        }
        for (name, value) in &obs_headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(content_type) = content_type {
            req = req.header(CONTENT_TYPE, content_type);
        }
        if let Some(content_md5) = content_md5 {
            req = req.header("Content-MD5", content_md5);
        }

        req.body(body).send().map_err(|err| {
            Error::new(ErrorKind::Unexpected, "sending request failed")
                .with_operation(op)
                .with_context("url", &url)
                .set_temporary()
                .set_source(err)
        })
    }

    fn read_body(op: &'static str, resp: Response) -> Result<Bytes> {
        resp.bytes().map_err(|err| {
            Error::new(ErrorKind::Unexpected, "reading response body failed")
                .with_operation(op)
                .set_temporary()
                .set_source(err)
        })
    }

    fn parse_xml<T: serde::de::DeserializeOwned>(op: &'static str, body: Bytes) -> Result<T> {
        de::from_reader(body.reader()).map_err(|err| {
            Error::new(ErrorKind::Unexpected, "parsing xml response failed")
                .with_operation(op)
                .set_source(err)
        })
    }

    fn serialize_xml<T: Serialize>(op: &'static str, value: &T) -> Result<String> {
        se::to_string(value).map_err(|err| {
            Error::new(ErrorKind::Unexpected, "serializing xml request failed")
                .with_operation(op)
                .set_source(err)
        })
    }
}

impl ObsApi for ObsCore {
    fn head_bucket(&self) -> Result<()> {
        let resp = self.send(
            "head_bucket",
            Method::HEAD,
            "",
            None,
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if resp.status().is_success() {
            return Ok(());
        }

        let err = parse_error(resp);
        // A 404 on the bucket itself is a deployment problem, not a missing
        // object.
        if err.kind() == ErrorKind::NotFound {
            return Err(Error::new(ErrorKind::ConfigInvalid, "bucket not found")
                .with_context("bucket", &self.bucket));
        }
        Err(err)
    }

    fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        let resp = self.send(
            "head_object",
            Method::HEAD,
            key,
            None,
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }

        let headers = resp.headers();
        let header_str = |name: &reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(HeadObjectOutput {
            content_length: header_str(&CONTENT_LENGTH)
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            content_type: header_str(&CONTENT_TYPE),
            last_modified: header_str(&LAST_MODIFIED)
                .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            etag: header_str(&ETAG),
        })
    }

    fn get_object(&self, key: &str) -> Result<Bytes> {
        let resp = self.send(
            "get_object",
            Method::GET,
            key,
            None,
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Self::read_body("get_object", resp)
    }

    fn get_object_reader(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let resp = self.send(
            "get_object_reader",
            Method::GET,
            key,
            None,
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(Box::new(resp))
    }

    fn put_object(&self, key: &str, body: Bytes, opts: &PutOptions) -> Result<()> {
        let mut obs_headers = BTreeMap::new();
        if let Some(acl) = opts.acl {
            obs_headers.insert("x-obs-acl".to_string(), acl.to_string());
        }

        let resp = self.send(
            "put_object",
            Method::PUT,
            key,
            None,
            &[],
            obs_headers,
            opts.content_type.as_deref(),
            None,
            Body::from(body.to_vec()),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn put_object_reader(
        &self,
        key: &str,
        body: Box<dyn Read + Send>,
        size: u64,
        opts: &PutOptions,
    ) -> Result<()> {
        let mut obs_headers = BTreeMap::new();
        if let Some(acl) = opts.acl {
            obs_headers.insert("x-obs-acl".to_string(), acl.to_string());
        }

        let resp = self.send(
            "put_object_reader",
            Method::PUT,
            key,
            None,
            &[],
            obs_headers,
            opts.content_type.as_deref(),
            None,
            Body::sized(body, size),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        let resp = self.send(
            "delete_object",
            Method::DELETE,
            key,
            None,
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        // Deleting what's already gone is a success.
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(parse_error(resp))
    }

    fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsResult> {
        let request = DeleteObjectsRequest {
            object: keys
                .iter()
                .map(|key| DeleteObjectsRequestObject { key: key.clone() })
                .collect(),
        };
        let body = Self::serialize_xml("delete_objects", &request)?;
        let content_md5 = format_content_md5(body.as_bytes());

        let resp = self.send(
            "delete_objects",
            Method::POST,
            "",
            Some("delete"),
            &[],
            BTreeMap::new(),
            Some("application/xml"),
            Some(&content_md5),
            Body::from(body),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Self::parse_xml("delete_objects", Self::read_body("delete_objects", resp)?)
    }

    fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        let mut obs_headers = BTreeMap::new();
        obs_headers.insert(
            "x-obs-copy-source".to_string(),
            format!("/{}/{}", self.bucket, percent_encode_path(from)),
        );

        let resp = self.send(
            "copy_object",
            Method::PUT,
            to,
            None,
            &[],
            obs_headers,
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn list_objects(
        &self,
        prefix: &str,
        marker: Option<&str>,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsOutput> {
        let mut query = vec![("max-keys", max_keys.to_string())];
        if !prefix.is_empty() {
            query.push(("prefix", prefix.to_string()));
        }
        if let Some(marker) = marker {
            query.push(("marker", marker.to_string()));
        }
        if !delimiter.is_empty() {
            query.push(("delimiter", delimiter.to_string()));
        }

        let resp = self.send(
            "list_objects",
            Method::GET,
            "",
            None,
            &query,
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Self::parse_xml("list_objects", Self::read_body("list_objects", resp)?)
    }

    fn get_object_acl(&self, key: &str) -> Result<AccessControlPolicy> {
        let resp = self.send(
            "get_object_acl",
            Method::GET,
            key,
            Some("acl"),
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Self::parse_xml("get_object_acl", Self::read_body("get_object_acl", resp)?)
    }

    fn set_object_acl(&self, key: &str, acl: &str) -> Result<()> {
        let mut obs_headers = BTreeMap::new();
        obs_headers.insert("x-obs-acl".to_string(), acl.to_string());

        let resp = self.send(
            "set_object_acl",
            Method::PUT,
            key,
            Some("acl"),
            &[],
            obs_headers,
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn get_object_tagging(&self, key: &str) -> Result<Tagging> {
        let resp = self.send(
            "get_object_tagging",
            Method::GET,
            key,
            Some("tagging"),
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Self::parse_xml(
            "get_object_tagging",
            Self::read_body("get_object_tagging", resp)?,
        )
    }

    fn set_object_tagging(&self, key: &str, tagging: &Tagging) -> Result<()> {
        let body = Self::serialize_xml("set_object_tagging", tagging)?;
        let content_md5 = format_content_md5(body.as_bytes());

        let resp = self.send(
            "set_object_tagging",
            Method::PUT,
            key,
            Some("tagging"),
            &[],
            BTreeMap::new(),
            Some("application/xml"),
            Some(&content_md5),
            Body::from(body),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn delete_object_tagging(&self, key: &str) -> Result<()> {
        let resp = self.send(
            "delete_object_tagging",
            Method::DELETE,
            key,
            Some("tagging"),
            &[],
            BTreeMap::new(),
            None,
            None,
            Body::from(""),
        )?;

        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }
        Ok(())
    }

    fn restore_object(&self, key: &str, days: u32) -> Result<()> {
        let body = Self::serialize_xml("restore_object", &RestoreRequest { days })?;

        let resp = self.send(
            "restore_object",
            Method::POST,
            key,
            Some("restore"),
            &[],
            BTreeMap::new(),
            Some("application/xml"),
            None,
            Body::from(body),
        )?;

        // 200 when already restored, 202 when the restore was accepted.
        if resp.status().is_success() {
            return Ok(());
        }
        Err(parse_error(resp))
    }

    fn object_url(&self, key: &str) -> String {
        self.object_uri(key, None)
    }

    fn signed_url(&self, method: &str, key: &str, expires_in: Duration) -> Result<String> {
        let credential = self.credential();
        let expires = (Utc::now().timestamp() + expires_in.as_secs() as i64).to_string();

        // The security token rides along as a query parameter and is part of
        // the canonicalized resource.
        let subresource = credential
            .security_token
            .as_ref()
            .map(|token| format!("{X_OBS_SECURITY_TOKEN}={token}"));
        let resource = self
            .signer
            .canonical_resource(key, subresource.as_deref());

        let signature =
            self.signer
                .query_signature(&credential, method, &expires, &BTreeMap::new(), &resource);

        let mut url = format!(
            "{}?AccessKeyId={}&Expires={}",
            self.object_uri(key, None),
            credential.access_key_id,
            expires,
        );
        if let Some(token) = &credential.security_token {
            url.push_str(&format!(
                "&{X_OBS_SECURITY_TOKEN}={}",
                utf8_percent_encode(token, NON_ALPHANUMERIC)
            ));
        }
        url.push_str(&format!(
            "&Signature={}",
            utf8_percent_encode(&signature, NON_ALPHANUMERIC)
        ));
        Ok(url)
    }

    fn post_signature(&self, expires_in: Duration, conditions: &[String]) -> Result<PostSignature> {
        let credential = self.credential();

        let expires_in = chrono::Duration::from_std(expires_in).map_err(|err| {
            Error::new(ErrorKind::ConfigInvalid, "expiry out of range")
                .with_operation("post_signature")
                .set_source(err)
        })?;
        let expiration = (Utc::now() + expires_in).format("%Y-%m-%dT%H:%M:%SZ");

        let policy = format!(
            r#"{{"expiration":"{expiration}","conditions":[{}]}}"#,
            conditions.join(",")
        );
        let policy = base64_encode(policy.as_bytes());
        let signature = self.signer.sign_policy(&credential, &policy);

        Ok(PostSignature {
            policy,
            signature,
            access_key_id: credential.access_key_id,
        })
    }

    fn refresh_credentials(&self, credential: Credential) {
        let mut current = self.credential.write().expect("credential lock poisoned");
        *current = credential;
    }
}

fn base64_encode(bs: &[u8]) -> String {
    use base64::engine::general_purpose;
    use base64::Engine;

    general_purpose::STANDARD.encode(bs)
}
