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

//! The claim set carried by a token assertion.

use crate::Result;
use crate::clock::Clock;
use crate::constants::{DEFAULT_TOKEN_LIFETIME, MAX_TOKEN_LIFETIME};
use crate::errors::AuthError;
use crate::scopes::ScopeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// The token issuer, usually the service account email.
pub const ISSUER: &str = "iss";
/// The principal the token acts on behalf of.
pub const SUBJECT: &str = "sub";
/// The intended recipient of the token.
pub const AUDIENCE: &str = "aud";
/// The expiration time, in seconds since the epoch.
pub const EXPIRATION_TIME: &str = "exp";
/// The issue time, in seconds since the epoch.
pub const ISSUED_AT: &str = "iat";
/// The space-delimited scopes requested by the token.
pub const SCOPE: &str = "scope";

const REGISTERED: [&str; 6] = [ISSUER, SUBJECT, AUDIENCE, EXPIRATION_TIME, ISSUED_AT, SCOPE];

/// The value of a single claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Integer(i64),
    String(String),
    StringList(Vec<String>),
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

/// An immutable map from claim names to values.
///
/// Claims serialize as a JSON object with the keys in lexicographic order,
/// so the same claims always produce the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    /// Returns the value of the claim named `name`.
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    /// Returns the value of an integer claim.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ClaimValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value of a string claim.
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ClaimValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// The `iat` claim.
    pub fn issued_at(&self) -> Option<i64> {
        self.integer(ISSUED_AT)
    }

    /// The `exp` claim.
    pub fn expires_at(&self) -> Option<i64> {
        self.integer(EXPIRATION_TIME)
    }

    /// Iterates over the claims in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The number of claims.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no claims.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Claims
where
    K: Into<String>,
    V: Into<ClaimValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Builds the claims for a token assertion.
///
/// The builder holds the caller identity. Each call to [build][Self::build]
/// produces a fresh claim set for one scope set, stamped with the clock.
///
/// ```
/// # use google_cloud_jwt_auth::claims::ClaimSetBuilder;
/// # use google_cloud_jwt_auth::clock::SystemClock;
/// # use google_cloud_jwt_auth::scopes::{ScopeSet, COMPUTE_SCOPE};
/// let builder = ClaimSetBuilder::new("sa@example.com", "https://oauth2.googleapis.com/token");
/// let claims = builder.build(&ScopeSet::new([COMPUTE_SCOPE])?, &SystemClock)?;
/// assert_eq!(claims.string("scope"), Some(COMPUTE_SCOPE));
/// assert!(claims.expires_at() > claims.issued_at());
/// # Ok::<(), google_cloud_jwt_auth::errors::AuthError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ClaimSetBuilder {
    issuer: String,
    audience: String,
    subject: Option<String>,
    lifetime: Duration,
    extensions: BTreeMap<String, ClaimValue>,
}

impl ClaimSetBuilder {
    /// Creates a builder for tokens issued by `issuer` and addressed to
    /// `audience`.
    pub fn new<I: Into<String>, A: Into<String>>(issuer: I, audience: A) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            subject: None,
            lifetime: DEFAULT_TOKEN_LIFETIME,
            extensions: BTreeMap::new(),
        }
    }

    /// Sets the `sub` claim, used for domain-wide delegation.
    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the token lifetime, the difference between `exp` and `iat`.
    ///
    /// Must be at least one second and at most one hour, otherwise
    /// [build][Self::build] fails.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Adds a claim outside the registered set.
    ///
    /// Names that clash with a claim set by the builder (`iss`, `sub`, `aud`,
    /// `iat`, `exp`, `scope`) make [build][Self::build] fail.
    pub fn with_extension_claim<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ClaimValue>,
    {
        self.extensions.insert(name.into(), value.into());
        self
    }

    /// Builds the claims for `scopes`, issued at the current time of `clock`.
    pub fn build(&self, scopes: &ScopeSet, clock: &dyn Clock) -> Result<Claims> {
        let now = clock.now();
        if now < OffsetDateTime::UNIX_EPOCH {
            return Err(AuthError::clock_skew(format!(
                "the clock reports {now:?}, which is before the unix epoch"
            )));
        }
        let lifetime = self.lifetime.as_secs();
        if lifetime == 0 || self.lifetime > MAX_TOKEN_LIFETIME {
            return Err(AuthError::encoding(format!(
                "the token lifetime must be between 1s and {}s, got {:?}",
                MAX_TOKEN_LIFETIME.as_secs(),
                self.lifetime
            )));
        }
        if let Some(name) = self
            .extensions
            .keys()
            .find(|k| REGISTERED.contains(&k.as_str()))
        {
            return Err(AuthError::encoding(format!(
                "the extension claim {name:?} conflicts with a registered claim"
            )));
        }

        let iat = now.unix_timestamp();
        // `lifetime` is at most one hour.
        let exp = iat + lifetime as i64;
        let mut claims = self.extensions.clone();
        claims.insert(ISSUER.to_string(), self.issuer.clone().into());
        claims.insert(AUDIENCE.to_string(), self.audience.clone().into());
        claims.insert(SCOPE.to_string(), scopes.to_string().into());
        claims.insert(ISSUED_AT.to_string(), iat.into());
        claims.insert(EXPIRATION_TIME.to_string(), exp.into());
        if let Some(sub) = &self.subject {
            claims.insert(SUBJECT.to_string(), sub.clone().into());
        }
        Ok(Claims(claims))
    }
}
