// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! [Scopes] requested for a token.
//!
//! Each API family declares the scopes its calls need, for example read-only
//! calls use [COMPUTE_READONLY_SCOPE] and mutations use [COMPUTE_SCOPE]. The
//! scope set is also the key of the token cache: two calls requesting the
//! same scopes, in any order, share a token.
//!
//! [Scopes]: https://developers.google.com/identity/protocols/oauth2/scopes

use crate::Result;
use crate::errors::AuthError;
use std::collections::BTreeSet;

/// Full access to all Google Cloud services.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
/// Read and write access to Compute Engine resources.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
/// Read-only access to Compute Engine resources.
pub const COMPUTE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/compute.readonly";

/// A non-empty, ordered, de-duplicated set of scopes.
///
/// ```
/// # use google_cloud_jwt_auth::scopes::{ScopeSet, COMPUTE_SCOPE};
/// let scopes = ScopeSet::new([COMPUTE_SCOPE])?;
/// assert_eq!(scopes.to_string(), COMPUTE_SCOPE);
/// # Ok::<(), google_cloud_jwt_auth::errors::AuthError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Creates a scope set.
    ///
    /// Returns an error if there are no scopes, or if any scope is empty or
    /// contains whitespace.
    pub fn new<I, S>(scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes = scopes
            .into_iter()
            .map(Into::into)
            .map(|s: String| {
                if s.is_empty() {
                    return Err(AuthError::invalid_scope("scopes must not be empty strings"));
                }
                if s.chars().any(char::is_whitespace) {
                    return Err(AuthError::invalid_scope(format!(
                        "scope {s:?} contains whitespace"
                    )));
                }
                Ok(s)
            })
            .collect::<Result<BTreeSet<_>>>()?;
        if scopes.is_empty() {
            return Err(AuthError::invalid_scope(
                "at least one scope must be requested",
            ));
        }
        Ok(Self(scopes))
    }

    /// Iterates over the scopes in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The number of distinct scopes. Never zero.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set contains `scope`.
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }
}

/// Formats the scopes as the space-delimited `scope` claim.
impl std::fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        for s in &self.0 {
            write!(f, "{sep}{s}")?;
            sep = " ";
        }
        Ok(())
    }
}

/// Parses a space-delimited list of scopes.
impl std::str::FromStr for ScopeSet {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.split_whitespace())
    }
}
