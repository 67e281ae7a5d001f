// Copyright 2024 Google LLC
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

//! Pluggable signing backends for token assertions.
//!
//! A [Signer] wraps any [SigningProvider]. The crate includes providers for
//! RSA keys ([rs256::RsaSigner], `RS256`), shared secrets
//! ([hs256::HmacSigner], `HS256`), and unsigned tokens
//! ([unsigned::NoopSigner], `none`) which are only useful in tests.
//!
//! Applications with keys held in a KMS or HSM can implement
//! [SigningProvider] themselves:
//!
//! ```
//! # use google_cloud_jwt_auth::signer::{Result, Signer, SigningProvider};
//! #[derive(Debug)]
//! struct MyKms;
//!
//! #[async_trait::async_trait]
//! impl SigningProvider for MyKms {
//!     fn algorithm(&self) -> &str {
//!         "RS256"
//!     }
//!     async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
//!         // Call the KMS here.
//!         Ok(content.iter().rev().copied().collect())
//!     }
//! }
//!
//! let signer = Signer::from(MyKms);
//! assert_eq!(signer.algorithm(), "RS256");
//! ```

pub mod hs256;
pub mod rs256;
pub mod unsigned;

use std::sync::Arc;

pub type Result<T> = std::result::Result<T, SigningError>;

/// The `alg` value for unsigned tokens.
pub const UNSIGNED_ALGORITHM: &str = "none";

/// A cloneable handle over a [SigningProvider].
///
/// The handle may be shared by any number of concurrent mints.
#[derive(Clone, Debug)]
pub struct Signer {
    inner: Arc<dyn SigningProvider>,
}

impl<T> std::convert::From<T> for Signer
where
    T: SigningProvider + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl Signer {
    /// The JWS `alg` header value for signatures created by this signer.
    pub fn algorithm(&self) -> &str {
        self.inner.algorithm()
    }

    /// The JWS `kid` header value, if the key has an id.
    pub fn key_id(&self) -> Option<&str> {
        self.inner.key_id()
    }

    /// Signs `content` and returns the raw signature bytes.
    ///
    /// An empty signature is only accepted from the `none` algorithm. Any
    /// other algorithm returning an empty signature is a [SigningError].
    pub async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        let signature = self.inner.sign(content).await?;
        if signature.is_empty() && self.algorithm() != UNSIGNED_ALGORITHM {
            return Err(SigningError::sign(format!(
                "the {} signer returned an empty signature",
                self.algorithm()
            )));
        }
        Ok(signature)
    }
}

/// Signs the `header.claims` signing input of a token.
///
/// Implementations must be safe to call from many tasks at once, and must not
/// retain `content` past the call.
#[async_trait::async_trait]
pub trait SigningProvider: Send + Sync + std::fmt::Debug {
    /// The JWS `alg` header value, e.g. `RS256`.
    fn algorithm(&self) -> &str;

    /// The JWS `kid` header value.
    fn key_id(&self) -> Option<&str> {
        None
    }

    /// Returns the signature over `content`.
    async fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents an error signing a token assertion.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct SigningError(SigningErrorKind);

impl SigningError {
    /// A problem parsing or loading the key material.
    pub fn is_parsing(&self) -> bool {
        matches!(self.0, SigningErrorKind::Parsing(_))
    }

    /// The signing backend failed to produce a signature.
    pub fn is_sign(&self) -> bool {
        matches!(self.0, SigningErrorKind::Sign(_))
    }

    /// A problem parsing or loading the key material.
    pub fn parsing<T>(source: T) -> SigningError
    where
        T: Into<BoxError>,
    {
        SigningError(SigningErrorKind::Parsing(source.into()))
    }

    /// The signing backend failed to produce a signature.
    pub fn sign<T>(source: T) -> SigningError
    where
        T: Into<BoxError>,
    {
        SigningError(SigningErrorKind::Sign(source.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum SigningErrorKind {
    #[error("failed to parse the signing key: {0}")]
    Parsing(#[source] BoxError),
    #[error("failed to generate signature: {0}")]
    Sign(#[source] BoxError),
}
