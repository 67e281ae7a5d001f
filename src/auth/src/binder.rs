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

//! Mints signed token assertions and attaches them to requests.

use crate::Result;
use crate::claims::ClaimSetBuilder;
use crate::clock::{Clock, SystemClock};
use crate::constants::{BEARER_TOKEN_TYPE, FORM_URLENCODED};
use crate::errors::AuthError;
use crate::headers_util::{assertion_form, authorization_value};
use crate::jws::{Header, TokenRequest, compact};
use crate::scopes::ScopeSet;
use crate::signer::Signer;
use crate::token::{Token, TokenProvider};
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use std::sync::Arc;
use time::OffsetDateTime;

/// Where a signed assertion goes in an outgoing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// As an `Authorization: Bearer <token>` header.
    BearerHeader,
    /// As the `application/x-www-form-urlencoded` body of a JWT bearer grant,
    /// replacing any existing body.
    AssertionForm,
}

/// Drives the claim set builder, the compact serializer and the signer to
/// produce a `header.claims.signature` token.
///
/// The steps run in order and stop at the first failure. Requests are only
/// modified once a token has been produced.
#[derive(Clone, Debug)]
pub struct TokenBinder {
    claims: ClaimSetBuilder,
    signer: Signer,
    clock: Arc<dyn Clock>,
}

impl TokenBinder {
    /// Creates a binder using the system clock.
    pub fn new(claims: ClaimSetBuilder, signer: Signer) -> Self {
        Self {
            claims,
            signer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp `iat` and `exp`.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(crate) fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the unsigned header and claims for `scopes`.
    pub fn token_request(&self, scopes: &ScopeSet) -> Result<TokenRequest> {
        let claims = self.claims.build(scopes, self.clock.as_ref())?;
        Ok(TokenRequest::new(Header::for_signer(&self.signer), claims))
    }

    /// Serializes and signs `request`, returning the compact token.
    pub async fn sign_request(&self, request: TokenRequest) -> Result<String> {
        let signing_input = request.signing_input()?;
        let signature = self
            .signer
            .sign(signing_input.as_bytes())
            .await
            .map_err(AuthError::signing)?;
        Ok(compact(&signing_input, &signature))
    }

    /// Mints a new compact token for `scopes`.
    pub async fn mint(&self, scopes: &ScopeSet) -> Result<String> {
        Ok(self.mint_token(scopes).await?.token)
    }

    /// Signs `token_request` and attaches the result to `request`.
    ///
    /// On error `request` is left unchanged.
    pub async fn bind(
        &self,
        request: &mut http::Request<Bytes>,
        token_request: TokenRequest,
        binding: Binding,
    ) -> Result<()> {
        let token = self.sign_request(token_request).await?;
        match binding {
            Binding::BearerHeader => {
                let value = authorization_value(BEARER_TOKEN_TYPE, &token)?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Binding::AssertionForm => {
                request
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
                *request.body_mut() = assertion_form(&token);
            }
        }
        Ok(())
    }

    async fn mint_token(&self, scopes: &ScopeSet) -> Result<Token> {
        let request = self.token_request(scopes)?;
        let issued_at = timestamp(request.claims().issued_at())?;
        let expires_at = timestamp(request.claims().expires_at())?;
        tracing::debug!(
            %scopes,
            alg = self.signer.algorithm(),
            kid = ?self.signer.key_id(),
            "signing a token assertion"
        );
        let token = self.sign_request(request).await?;
        Ok(Token {
            token,
            token_type: BEARER_TOKEN_TYPE.to_string(),
            issued_at,
            expires_at,
        })
    }
}

fn timestamp(claim: Option<i64>) -> Result<OffsetDateTime> {
    let secs = claim.ok_or_else(|| AuthError::encoding("missing timestamp claim"))?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(AuthError::encoding)
}

#[async_trait::async_trait]
impl TokenProvider for TokenBinder {
    async fn token(&self, scopes: &ScopeSet) -> Result<Token> {
        self.mint_token(scopes).await
    }
}
