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

use std::fmt::Debug;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// Config for the Huawei Cloud OBS filesystem adapter.
#[derive(Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct ObsConfig {
    /// Key prefix applied to every logical path. Optional.
    pub root: Option<String>,
    /// Endpoint for obs.
    pub endpoint: Option<String>,
    /// Access key id for obs.
    pub access_key_id: Option<String>,
    /// Secret access key for obs.
    pub secret_access_key: Option<String>,
    /// Security token for temporary credentials. Optional.
    pub security_token: Option<String>,
    /// Bucket for obs.
    pub bucket: Option<String>,
    /// How many attempts one remote call gets before its failure surfaces.
    /// Defaults to 3.
    pub retry_max_attempts: Option<usize>,
    /// Base delay in seconds of the exponential backoff between attempts.
    /// Defaults to 1.
    pub retry_base_delay_secs: Option<u64>,
    /// How long a successful liveness probe stays cached, in seconds.
    /// Defaults to 300.
    pub auth_cache_ttl_secs: Option<u64>,
    /// Master switch for adapter logging.
    pub logging_enabled: bool,
    /// Log every operation at debug level.
    pub log_operations: bool,
    /// Log failed operations at warn level.
    pub log_errors: bool,
}

impl Debug for ObsConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObsConfig")
            .field("root", &self.root)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("security_token", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_secs", &self.retry_base_delay_secs)
            .field("auth_cache_ttl_secs", &self.auth_cache_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_credentials() {
        let cfg = ObsConfig {
            access_key_id: Some("AKEXAMPLE".to_string()),
            secret_access_key: Some("SKEXAMPLE".to_string()),
            security_token: Some("TOKENEXAMPLE".to_string()),
            bucket: Some("test".to_string()),
            ..Default::default()
        };

        let repr = format!("{cfg:?}");
        assert!(!repr.contains("AKEXAMPLE"));
        assert!(!repr.contains("SKEXAMPLE"));
        assert!(!repr.contains("TOKENEXAMPLE"));
        assert!(repr.contains("<redacted>"));
    }
}
