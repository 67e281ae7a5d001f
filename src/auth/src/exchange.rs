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

//! Exchanges signed assertions for access tokens.
//!
//! Implements the [JWT bearer grant]: the assertion is posted to the token
//! endpoint as a form, and the endpoint returns an access token.
//!
//! [JWT bearer grant]: https://datatracker.ietf.org/doc/html/rfc7523#section-2.1

use crate::Result;
use crate::binder::{Binding, TokenBinder};
use crate::clock::Clock;
use crate::constants::BEARER_TOKEN_TYPE;
use crate::errors::{self, AuthError};
use crate::scopes::ScopeSet;
use crate::token::{Token, TokenProvider};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;

/// The token endpoint response.
#[derive(Deserialize, PartialEq, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
}

fn default_token_type() -> String {
    BEARER_TOKEN_TYPE.to_string()
}

#[derive(Clone, Debug)]
pub(crate) struct TokenExchange {
    binder: TokenBinder,
    endpoint: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl TokenExchange {
    pub(crate) fn new(binder: TokenBinder, endpoint: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            binder,
            endpoint,
            client: reqwest::Client::new(),
            clock,
        }
    }

    async fn exchange(&self, scopes: &ScopeSet) -> Result<Token> {
        let mut request = http::Request::builder()
            .method(http::Method::POST)
            .uri(&self.endpoint)
            .body(Bytes::new())
            .map_err(|e| AuthError::exchange(false, e))?;
        let token_request = self.binder.token_request(scopes)?;
        self.binder
            .bind(&mut request, token_request, Binding::AssertionForm)
            .await?;
        let request =
            reqwest::Request::try_from(request).map_err(|e| AuthError::exchange(false, e))?;

        let issued_at = self.clock.now();
        tracing::debug!(%scopes, endpoint = %self.endpoint, "exchanging a token assertion");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| AuthError::exchange(true, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| AuthError::exchange(errors::is_retryable(status), e))?;
            return Err(AuthError::exchange(
                errors::is_retryable(status),
                format!("the token endpoint returned {status}: {body}"),
            ));
        }
        let response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::exchange(false, e))?;
        let expires_at = i64::try_from(response.expires_in)
            .ok()
            .and_then(|secs| issued_at.checked_add(Duration::seconds(secs)))
            .ok_or_else(|| {
                AuthError::exchange(
                    false,
                    format!("invalid expires_in in the token response: {}", response.expires_in),
                )
            })?;

        Ok(Token {
            token: response.access_token,
            token_type: response.token_type,
            issued_at,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for TokenExchange {
    async fn token(&self, scopes: &ScopeSet) -> Result<Token> {
        self.exchange(scopes).await
    }
}
