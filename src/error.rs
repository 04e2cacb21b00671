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

//! Classification of OBS error responses into [`Error`] values.

use bytes::Buf;
use quick_xml::de;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::types::Error;
use crate::types::ErrorKind;

/// Header OBS falls back to for the machine-readable error code when the
/// response carries no XML body (e.g. HEAD requests).
pub const X_OBS_ERROR_CODE: &str = "x-obs-error-code";

/// ObsError is the typed error value built from an OBS error response.
#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub(crate) struct ObsError {
    pub code: String,
    pub message: String,
    pub resource: String,
    pub request_id: String,
}

/// Parse an error response into an [`Error`].
///
/// Consumes the response to read its body.
pub(crate) fn parse_error(resp: reqwest::blocking::Response) -> Error {
    let status = resp.status();
    let header_code = header_error_code(resp.headers());
    let request_id = resp
        .headers()
        .get("x-obs-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.bytes().unwrap_or_default();

    let mut err = parse_error_parts(status, header_code.as_deref(), &body);
    if let Some(request_id) = request_id {
        err = err.with_context("request_id", request_id);
    }
    err
}

/// Classify status, error code and body into an [`Error`].
pub(crate) fn parse_error_parts(
    status: StatusCode,
    header_code: Option<&str>,
    body: &[u8],
) -> Error {
    let (mut kind, mut retryable) = match status.as_u16() {
        401 | 403 => (ErrorKind::PermissionDenied, false),
        404 => (ErrorKind::NotFound, false),
        429 => (ErrorKind::RateLimited, true),
        500 | 502 | 503 | 504 => (ErrorKind::Unexpected, true),
        _ => (ErrorKind::Unexpected, false),
    };

    let (message, obs_err) = de::from_reader::<_, ObsError>(body.reader())
        .map(|obs_err| (format!("{obs_err:?}"), Some(obs_err)))
        .unwrap_or_else(|_| (String::from_utf8_lossy(body).into_owned(), None));

    // The code may need fallback extraction from the response header when the
    // body carries none, which is always the case for HEAD responses.
    let code = match obs_err {
        Some(obs_err) if !obs_err.code.is_empty() => Some(obs_err.code),
        _ => header_code.map(str::to_string),
    };

    if let Some(code) = &code {
        (kind, retryable) = parse_obs_error_code(code).unwrap_or((kind, retryable));
    }

    let mut err = Error::new(kind, message).with_context("status", status.as_str());
    if let Some(code) = code {
        err = err.with_context("code", code);
    }

    if retryable {
        err = err.set_temporary();
    }

    err
}

/// Returns the `ErrorKind` of this code and whether the error is retryable.
///
/// Codes follow the S3-compatible list OBS implements:
/// <https://support.huaweicloud.com/intl/en-us/api-obs/obs_04_0115.html>
pub fn parse_obs_error_code(code: &str) -> Option<(ErrorKind, bool)> {
    match code {
        // Credential-class failures. Fatal for the call; callers can
        // special-case the kind to trigger a credential refresh flow.
        "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
        | "InvalidSecurity" => Some((ErrorKind::PermissionDenied, false)),
        // A wrong bucket name is a deployment problem, not retryable even
        // though the status is 404.
        "NoSuchBucket" => Some((ErrorKind::ConfigInvalid, false)),
        "NoSuchKey" | "NoSuchUpload" => Some((ErrorKind::NotFound, false)),
        // > Your socket connection to the server was not read from or
        // > written to within the timeout period.
        "RequestTimeout" => Some((ErrorKind::Unexpected, true)),
        // > An internal error occurred. Try again.
        "InternalError" => Some((ErrorKind::Unexpected, true)),
        // > A conflicting conditional operation is currently in progress
        // > against this resource. Try again.
        "OperationAborted" => Some((ErrorKind::Unexpected, true)),
        // > Please reduce your request rate.
        "SlowDown" | "TooManyRequests" => Some((ErrorKind::RateLimited, true)),
        // > Service is unable to handle request.
        "ServiceUnavailable" => Some((ErrorKind::Unexpected, true)),
        _ => None,
    }
}

fn header_error_code(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_OBS_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
