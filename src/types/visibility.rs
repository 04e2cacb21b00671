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

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// Canned ACL granting anonymous users read access on an object.
pub const ACL_PUBLIC_READ: &str = "public-read";
/// Canned ACL restricting an object to its owner.
pub const ACL_PRIVATE: &str = "private";

/// Visibility is the two-valued abstraction exposed in place of raw ACLs.
///
/// `Unknown` only ever appears on entries whose ACL has not been fetched,
/// e.g. entries produced by a listing. It's never accepted as an input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Anonymous users can read the object.
    Public,
    /// Only the owner can access the object.
    #[default]
    Private,
    /// The ACL has not been fetched for this entry.
    Unknown,
}

impl Visibility {
    /// Map a visibility onto the canned ACL value sent to the service.
    ///
    /// Everything that is not `Public`, including `Unknown`, maps to the
    /// private ACL. This is a total function with no failure mode.
    pub fn into_acl(self) -> &'static str {
        match self {
            Visibility::Public => ACL_PUBLIC_READ,
            _ => ACL_PRIVATE,
        }
    }

    /// Parse a visibility from its string form.
    ///
    /// Unrecognized values are treated as private, mirroring [`into_acl`].
    ///
    /// [`into_acl`]: Visibility::into_acl
    pub fn parse(v: &str) -> Self {
        match v {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }

    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unknown => "unknown",
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}
