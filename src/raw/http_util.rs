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

use base64::engine::general_purpose;
use base64::Engine;
use md5::Digest;
use md5::Md5;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

/// The characters percent-encoded in an object key when it appears in a URL
/// path.
///
/// Following [AWS S3's object key naming guide](https://docs.aws.amazon.com/AmazonS3/latest/userguide/object-keys.html), we will treat the following characters as safe:
///
/// - `/`: the path separator itself.
/// - `-`, `_`, `.`, `!`, `~`, `*`, `'`, `(`, `)`: safe characters that
///   services don't require to be encoded.
static PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode an object key for use as a URL path.
pub fn percent_encode_path(path: &str) -> String {
    utf8_percent_encode(path, &PATH_ENCODE_SET).to_string()
}

/// Compute the `Content-MD5` header value of a request body: the base64 of
/// the 128-bit MD5 digest, per RFC 1864.
///
/// Batch delete and tagging writes refuse requests without it.
pub fn format_content_md5(bs: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bs);

    general_purpose::STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_percent_encode_path() {
        let cases = vec![
            ("empty", "", ""),
            ("file path", "abc/def.txt", "abc/def.txt"),
            ("dir path", "abc/def/", "abc/def/"),
            ("percent", "abc/def%2F.txt", "abc/def%252F.txt"),
            ("plus", "abc/def+g.txt", "abc/def%2Bg.txt"),
            ("space", "abc/def g.txt", "abc/def%20g.txt"),
            (
                "unicode",
                "abc/用户数据.txt",
                "abc/%E7%94%A8%E6%88%B7%E6%95%B0%E6%8D%AE.txt",
            ),
        ];

        for (name, input, expect) in cases {
            assert_eq!(percent_encode_path(input), expect, "{name}");
        }
    }

    #[test]
    fn test_format_content_md5() {
        // RFC 1321 test vector.
        assert_eq!(format_content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        assert_eq!(format_content_md5(b"abc"), "kAFQmDzST7DWlj99KOF/cg==");
    }
}
