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

//! The seam towards the remote OBS client.
//!
//! [`ObsApi`] is everything the adapter consumes from the service, one method
//! per remote call, with typed outputs constructed straight from the wire
//! response. The production implementation is [`ObsCore`](crate::core::ObsCore);
//! tests script the trait directly.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::types::Result;
use crate::types::Visibility;

/// A set of OBS credentials.
#[derive(Clone)]
pub struct Credential {
    /// The access key id.
    pub access_key_id: String,
    /// The secret access key.
    pub secret_access_key: String,
    /// Security token for temporary credentials, sent as
    /// `x-obs-security-token`.
    pub security_token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("security_token", &"<redacted>")
            .finish()
    }
}

/// Options applied to a put-object call.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// MIME type sent as `Content-Type`.
    pub content_type: Option<String>,
    /// Canned ACL sent as `x-obs-acl`.
    pub acl: Option<&'static str>,
}

/// Output of a head-object call, built from response headers.
#[derive(Clone, Debug, Default)]
pub struct HeadObjectOutput {
    /// Object size in bytes.
    pub content_length: u64,
    /// MIME type, if the service reported one.
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag.
    pub etag: Option<String>,
}

/// Output of ListObjects.
///
/// `#[serde(default)]` keeps the parse going even when a field is absent,
/// which happens for empty buckets and last pages.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ListObjectsOutput {
    pub is_truncated: Option<bool>,
    pub next_marker: Option<String>,
    pub common_prefixes: Vec<OutputCommonPrefix>,
    pub contents: Vec<ListObjectsOutputContent>,
}

#[derive(Default, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ListObjectsOutputContent {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
}

#[derive(Default, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputCommonPrefix {
    pub prefix: String,
}

/// Request of DeleteObjects.
#[derive(Default, Debug, Serialize)]
#[serde(default, rename = "Delete", rename_all = "PascalCase")]
pub struct DeleteObjectsRequest {
    pub object: Vec<DeleteObjectsRequestObject>,
}

#[derive(Default, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteObjectsRequestObject {
    pub key: String,
}

/// Result of DeleteObjects.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeleteObjectsResult {
    pub deleted: Vec<DeleteObjectsResultDeleted>,
    pub error: Vec<DeleteObjectsResultError>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeleteObjectsResultDeleted {
    pub key: String,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeleteObjectsResultError {
    pub code: String,
    pub key: String,
    pub message: String,
}

/// Output of GetObjectAcl.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AccessControlPolicy {
    pub access_control_list: AccessControlList,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AccessControlList {
    pub grant: Vec<Grant>,
}

/// An (principal, permission) pair in the remote access-control model.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: String,
}

/// The principal of a grant. OBS identifies the all-users group either by the
/// canned group name `Everyone` or by the S3-compatible `AllUsers` group URI.
#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Grantee {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    #[serde(rename = "URI")]
    pub uri: Option<String>,
    pub canned: Option<String>,
}

impl Grantee {
    /// Whether this principal is the "all users" well-known group.
    pub fn is_all_users(&self) -> bool {
        if self.canned.as_deref() == Some("Everyone") {
            return true;
        }
        matches!(&self.uri, Some(uri) if uri.ends_with("/AllUsers"))
    }
}

impl AccessControlPolicy {
    /// Derive the two-valued visibility from the grant list.
    ///
    /// Public when any grant gives the all-users group read or read-ACL
    /// access. Order-independent, the first qualifying grant short-circuits.
    pub fn visibility(&self) -> Visibility {
        let public = self.access_control_list.grant.iter().any(|grant| {
            grant.grantee.is_all_users()
                && matches!(grant.permission.as_str(), "READ" | "READ_ACP")
        });

        if public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// Object tagging body, shared by get and set.
#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct Tagging {
    pub tag_set: TagSet,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct TagSet {
    pub tag: Vec<Tag>,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// A browser-form upload signature.
#[derive(Clone, Debug)]
pub struct PostSignature {
    /// The base64-encoded policy document.
    pub policy: String,
    /// HMAC-SHA1 signature over the policy.
    pub signature: String,
    /// The access key the form must send alongside the signature.
    pub access_key_id: String,
}

/// ObsApi is the remote collaborator contract: every call the adapter issues
/// against the service, with failures already classified into [`Error`]
/// kinds by the implementation.
///
/// All calls are blocking. One implementor handle is owned exclusively by one
/// adapter instance.
///
/// [`Error`]: crate::Error
pub trait ObsApi: Send + Sync {
    /// Liveness probe against the configured bucket.
    fn head_bucket(&self) -> Result<()>;

    /// Fetch object metadata without the body.
    fn head_object(&self, key: &str) -> Result<HeadObjectOutput>;

    /// Fetch a whole object into memory.
    fn get_object(&self, key: &str) -> Result<Bytes>;

    /// Open a streaming reader over an object body.
    fn get_object_reader(&self, key: &str) -> Result<Box<dyn Read + Send>>;

    /// Write a whole object from memory.
    fn put_object(&self, key: &str, body: Bytes, opts: &PutOptions) -> Result<()>;

    /// Write an object from a reader with a known length.
    fn put_object_reader(
        &self,
        key: &str,
        body: Box<dyn Read + Send>,
        size: u64,
        opts: &PutOptions,
    ) -> Result<()>;

    /// Delete a single object. Deleting a missing object succeeds.
    fn delete_object(&self, key: &str) -> Result<()>;

    /// Delete a batch of objects in one call.
    fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsResult>;

    /// Server-side copy between two keys in the bucket.
    fn copy_object(&self, from: &str, to: &str) -> Result<()>;

    /// Fetch one page of a listing.
    ///
    /// An empty `delimiter` flattens all nesting; `"/"` stops at one
    /// directory level and reports deeper levels as common prefixes.
    fn list_objects(
        &self,
        prefix: &str,
        marker: Option<&str>,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsOutput>;

    /// Fetch the grant list of an object.
    fn get_object_acl(&self, key: &str) -> Result<AccessControlPolicy>;

    /// Replace the object ACL with a canned one.
    fn set_object_acl(&self, key: &str, acl: &str) -> Result<()>;

    /// Fetch the tag set of an object.
    fn get_object_tagging(&self, key: &str) -> Result<Tagging>;

    /// Replace the tag set of an object.
    fn set_object_tagging(&self, key: &str, tagging: &Tagging) -> Result<()>;

    /// Remove all tags from an object.
    fn delete_object_tagging(&self, key: &str) -> Result<()>;

    /// Restore an archived object for `days` days.
    fn restore_object(&self, key: &str, days: u32) -> Result<()>;

    /// The direct, unsigned endpoint URL of an object.
    fn object_url(&self, key: &str) -> String;

    /// A time-limited query-signed URL for an object.
    fn signed_url(&self, method: &str, key: &str, expires_in: Duration) -> Result<String>;

    /// A policy + signature pair for browser-based form uploads.
    fn post_signature(&self, expires_in: Duration, conditions: &[String]) -> Result<PostSignature>;

    /// Swap the credential set used for signing from now on.
    fn refresh_credentials(&self, credential: Credential);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_list_objects_output() {
        let bs = bytes::Bytes::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://obs.myhuaweicloud.com/doc/2015-06-30/">
  <Name>examplebucket</Name>
  <Prefix>dir/</Prefix>
  <Marker></Marker>
  <NextMarker>dir/x.txt</NextMarker>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <Contents>
    <Key>dir/x.txt</Key>
    <LastModified>2024-05-01T12:00:00.000Z</LastModified>
    <ETag>"abc"</ETag>
    <Size>11</Size>
  </Contents>
  <CommonPrefixes>
    <Prefix>dir/sub/</Prefix>
  </CommonPrefixes>
</ListBucketResult>"#,
        );

        let out: ListObjectsOutput =
            quick_xml::de::from_reader(bytes::Buf::reader(bs)).expect("must success");

        assert_eq!(out.next_marker.as_deref(), Some("dir/x.txt"));
        assert_eq!(out.is_truncated, Some(true));
        assert_eq!(out.contents.len(), 1);
        assert_eq!(out.contents[0].key, "dir/x.txt");
        assert_eq!(out.contents[0].size, 11);
        assert_eq!(out.common_prefixes.len(), 1);
        assert_eq!(out.common_prefixes[0].prefix, "dir/sub/");
    }

    #[test]
    fn test_parse_list_objects_output_last_page() {
        let bs = bytes::Bytes::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://obs.myhuaweicloud.com/doc/2015-06-30/">
  <Name>examplebucket</Name>
  <IsTruncated>false</IsTruncated>
</ListBucketResult>"#,
        );

        let out: ListObjectsOutput =
            quick_xml::de::from_reader(bytes::Buf::reader(bs)).expect("must success");

        assert_eq!(out.next_marker, None);
        assert!(out.contents.is_empty());
        assert!(out.common_prefixes.is_empty());
    }

    #[test]
    fn test_serialize_delete_objects_request() {
        let req = DeleteObjectsRequest {
            object: vec![
                DeleteObjectsRequestObject {
                    key: "dir/x.txt".to_string(),
                },
                DeleteObjectsRequestObject {
                    key: "dir/y.txt".to_string(),
                },
            ],
        };

        let actual = quick_xml::se::to_string(&req).expect("must success");

        assert_eq!(
            actual,
            "<Delete><Object><Key>dir/x.txt</Key></Object><Object><Key>dir/y.txt</Key></Object></Delete>"
        );
    }

    #[test]
    fn test_visibility_from_grants() {
        let bs = bytes::Bytes::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<AccessControlPolicy>
  <Owner><ID>owner-id</ID></Owner>
  <AccessControlList>
    <Grant>
      <Grantee><ID>owner-id</ID></Grantee>
      <Permission>FULL_CONTROL</Permission>
    </Grant>
    <Grant>
      <Grantee><Canned>Everyone</Canned></Grantee>
      <Permission>READ</Permission>
    </Grant>
  </AccessControlList>
</AccessControlPolicy>"#,
        );

        let policy: AccessControlPolicy =
            quick_xml::de::from_reader(bytes::Buf::reader(bs)).expect("must success");
        assert_eq!(policy.visibility(), Visibility::Public);
    }

    #[test]
    fn test_visibility_without_grants() {
        let policy = AccessControlPolicy::default();
        assert_eq!(policy.visibility(), Visibility::Private);
    }

    #[test]
    fn test_visibility_all_users_uri() {
        let policy = AccessControlPolicy {
            access_control_list: AccessControlList {
                grant: vec![Grant {
                    grantee: Grantee {
                        uri: Some("http://acs.amazonaws.com/groups/global/AllUsers".to_string()),
                        ..Default::default()
                    },
                    permission: "READ_ACP".to_string(),
                }],
            },
        };
        assert_eq!(policy.visibility(), Visibility::Public);

        // Write-only grants for all users stay private.
        let policy = AccessControlPolicy {
            access_control_list: AccessControlList {
                grant: vec![Grant {
                    grantee: Grantee {
                        canned: Some("Everyone".to_string()),
                        ..Default::default()
                    },
                    permission: "WRITE".to_string(),
                }],
            },
        };
        assert_eq!(policy.visibility(), Visibility::Private);
    }

    #[test]
    fn test_tagging_round_trip() {
        let tagging = Tagging {
            tag_set: TagSet {
                tag: vec![Tag {
                    key: "team".to_string(),
                    value: "media".to_string(),
                }],
            },
        };

        let xml = quick_xml::se::to_string(&tagging).expect("must success");
        assert_eq!(
            xml,
            "<Tagging><TagSet><Tag><Key>team</Key><Value>media</Value></Tag></TagSet></Tagging>"
        );

        let parsed: Tagging = quick_xml::de::from_str(&xml).expect("must success");
        assert_eq!(parsed, tagging);
    }
}
