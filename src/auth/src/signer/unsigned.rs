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

//! Unsigned tokens, for tests.

use crate::signer::{Result, SigningProvider, UNSIGNED_ALGORITHM};

/// Produces an empty signature and advertises the `none` algorithm.
///
/// Tokens minted with this signer have an empty third segment. No service
/// accepts them, use this signer in tests only.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSigner;

#[async_trait::async_trait]
impl SigningProvider for NoopSigner {
    fn algorithm(&self) -> &str {
        UNSIGNED_ALGORITHM
    }

    async fn sign(&self, _content: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
