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

//! `HS256` signatures with a shared secret.

use crate::signer::{Result, SigningError, SigningProvider};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// The JWS algorithm name for HMAC with SHA-256.
pub const HS256: &str = "HS256";

/// Signs with a shared secret using HMAC-SHA256.
#[derive(Clone)]
pub struct HmacSigner {
    secret: Vec<u8>,
    key_id: Option<String>,
}

impl HmacSigner {
    /// Creates a signer from the shared secret.
    ///
    /// Returns an error if the secret is empty.
    pub fn new<T: Into<Vec<u8>>>(secret: T) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SigningError::parsing("the HMAC secret must not be empty"));
        }
        Ok(Self {
            secret,
            key_id: None,
        })
    }

    /// Sets the `kid` header value for tokens signed with this secret.
    pub fn with_key_id<S: Into<String>>(mut self, key_id: S) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"[censored]")
            .field("key_id", &self.key_id)
            .finish()
    }
}

#[async_trait::async_trait]
impl SigningProvider for HmacSigner {
    fn algorithm(&self) -> &str {
        HS256
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret).map_err(SigningError::sign)?;
        mac.update(content);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
