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

//! Attaches cached credentials to outgoing requests.
//!
//! An [Authenticator] keeps one token per [ScopeSet]. Each request is
//! authenticated with the cached token for its scope set, a new token is
//! minted when there is none or the cached token is about to expire.
//!
//! ```no_run
//! # use google_cloud_jwt_auth::authenticator::Builder;
//! # use google_cloud_jwt_auth::key::ServiceAccountKey;
//! # use google_cloud_jwt_auth::scopes::{ScopeSet, COMPUTE_READONLY_SCOPE};
//! # tokio_test::block_on(async {
//! let key = ServiceAccountKey::from_file("/path/to/key.json")?;
//! let auth = Builder::default().service_account_key(key).build()?;
//! let scopes = ScopeSet::new([COMPUTE_READONLY_SCOPE])?;
//! let request = http::Request::builder()
//!     .uri("https://compute.googleapis.com/compute/v1/projects/my-project/regions/us-central1/targetPools")
//!     .body(())?;
//! let request = auth.authenticate(request, &scopes).await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

use crate::Result;
use crate::binder::TokenBinder;
use crate::build_errors::BuildError;
use crate::claims::{ClaimSetBuilder, ClaimValue};
use crate::clock::{Clock, SystemClock};
use crate::constants::{
    DEFAULT_SKEW_MARGIN, DEFAULT_TOKEN_LIFETIME, DEFAULT_TOKEN_URI,
    GOOGLE_APPLICATION_CREDENTIALS_VAR, MAX_TOKEN_LIFETIME,
};
use crate::exchange::TokenExchange;
use crate::headers_util::{authorization_value, build_bearer_headers};
use crate::key::ServiceAccountKey;
use crate::scopes::ScopeSet;
use crate::signer::Signer;
use crate::token::Token;
use crate::token_cache::TokenCache;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::sync::Arc;
use std::time::Duration;

/// Authenticates outgoing requests with cached bearer tokens.
///
/// Cloning an `Authenticator` is cheap, clones share the token cache.
#[derive(Clone, Debug)]
pub struct Authenticator {
    cache: TokenCache,
    binder: TokenBinder,
}

impl Authenticator {
    /// Adds an `Authorization` header with a valid token for `scopes`.
    ///
    /// On error the request is dropped without being modified.
    pub async fn authenticate<B>(
        &self,
        mut request: http::Request<B>,
        scopes: &ScopeSet,
    ) -> Result<http::Request<B>> {
        let token = self.cache.token(scopes).await?;
        let value = authorization_value(&token.token_type, &token.token)?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }

    /// Returns the headers to authenticate a request for `scopes`.
    pub async fn headers(&self, scopes: &ScopeSet) -> Result<HeaderMap> {
        let token = self.cache.token(scopes).await?;
        build_bearer_headers(&token)
    }

    /// Returns a valid token for `scopes`, from the cache if possible.
    pub async fn token(&self, scopes: &ScopeSet) -> Result<Token> {
        self.cache.token(scopes).await
    }

    /// Mints a new signed assertion for `scopes`, bypassing the cache.
    pub async fn mint_token(&self, scopes: &ScopeSet) -> Result<String> {
        self.binder.mint(scopes).await
    }
}

/// A builder for [Authenticator].
///
/// With neither [signer][Builder::signer] nor
/// [service_account_key][Builder::service_account_key], the key is loaded
/// from the file named by the `GOOGLE_APPLICATION_CREDENTIALS` environment
/// variable.
#[derive(Debug)]
pub struct Builder {
    signer: Option<Signer>,
    service_account_key: Option<ServiceAccountKey>,
    issuer: Option<String>,
    audience: Option<String>,
    subject: Option<String>,
    extension_claims: Vec<(String, ClaimValue)>,
    token_lifetime: Duration,
    skew_margin: Duration,
    clock: Arc<dyn Clock>,
    token_endpoint: Option<String>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            signer: None,
            service_account_key: None,
            issuer: None,
            audience: None,
            subject: None,
            extension_claims: Vec::new(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            skew_margin: DEFAULT_SKEW_MARGIN,
            clock: Arc::new(SystemClock),
            token_endpoint: None,
        }
    }
}

impl Builder {
    /// Sets the signer for token assertions.
    ///
    /// Takes precedence over the private key in the
    /// [service account key][Builder::service_account_key].
    pub fn signer<T: Into<Signer>>(mut self, signer: T) -> Self {
        self.signer = Some(signer.into());
        self
    }

    /// Sets the [service account key].
    ///
    /// The key provides the `RS256` signer, and the default issuer and
    /// audience.
    ///
    /// [service account key]: https://cloud.google.com/iam/docs/keys-create-delete#creating
    pub fn service_account_key(mut self, key: ServiceAccountKey) -> Self {
        self.service_account_key = Some(key);
        self
    }

    /// Sets the `iss` claim.
    pub fn issuer<S: Into<String>>(mut self, issuer: S) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the `aud` claim.
    ///
    /// Defaults to the token endpoint, then the `token_uri` of the service
    /// account key, then `https://oauth2.googleapis.com/token`.
    pub fn audience<S: Into<String>>(mut self, audience: S) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets the `sub` claim, the user to impersonate with domain-wide
    /// delegation.
    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds an extension claim to every token.
    pub fn extension_claim<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ClaimValue>,
    {
        self.extension_claims.push((name.into(), value.into()));
        self
    }

    /// Sets the lifetime of minted tokens. Defaults to one hour, which is
    /// also the maximum.
    pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Sets how long before their expiration tokens are refreshed. Defaults
    /// to 30 seconds.
    pub fn skew_margin(mut self, margin: Duration) -> Self {
        self.skew_margin = margin;
        self
    }

    /// Sets the clock used to issue and expire tokens.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Exchanges assertions for access tokens at `endpoint`, instead of
    /// using the assertions directly as bearer tokens.
    pub fn token_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Returns an [Authenticator] with the configured settings.
    pub fn build(self) -> std::result::Result<Authenticator, BuildError> {
        let lifetime = self.token_lifetime;
        if lifetime <= self.skew_margin || lifetime > MAX_TOKEN_LIFETIME {
            return Err(BuildError::invalid(format!(
                "the token lifetime ({:?}) must be greater than the skew margin ({:?}) and at most {:?}",
                lifetime, self.skew_margin, MAX_TOKEN_LIFETIME
            )));
        }
        if let Some(endpoint) = &self.token_endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                BuildError::invalid(format!("invalid token endpoint {endpoint:?}: {e}"))
            })?;
        }

        let key = match (self.service_account_key, &self.signer) {
            (Some(key), _) => Some(key),
            (None, Some(_)) => None,
            (None, None) => Some(key_from_env()?),
        };
        let signer = match (self.signer, &key) {
            (Some(signer), _) => signer,
            (None, Some(key)) => Signer::from(key.signer().map_err(BuildError::parsing)?),
            (None, None) => return Err(BuildError::missing_field("signer")),
        };
        let issuer = self
            .issuer
            .or_else(|| key.as_ref().map(|k| k.client_email.clone()))
            .ok_or_else(|| BuildError::missing_field("issuer"))?;
        let audience = self
            .audience
            .or_else(|| self.token_endpoint.clone())
            .or_else(|| key.as_ref().and_then(|k| k.token_uri.clone()))
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        let mut claims = ClaimSetBuilder::new(issuer, audience).with_lifetime(lifetime);
        if let Some(subject) = self.subject {
            claims = claims.with_subject(subject);
        }
        for (name, value) in self.extension_claims {
            claims = claims.with_extension_claim(name, value);
        }

        let binder = TokenBinder::new(claims, signer).with_shared_clock(self.clock.clone());
        let cache = match self.token_endpoint {
            Some(endpoint) => TokenCache::new(
                TokenExchange::new(binder.clone(), endpoint, self.clock.clone()),
                self.clock.clone(),
                self.skew_margin,
            ),
            None => TokenCache::new(binder.clone(), self.clock.clone(), self.skew_margin),
        };
        Ok(Authenticator { cache, binder })
    }
}

fn key_from_env() -> std::result::Result<ServiceAccountKey, BuildError> {
    match std::env::var(GOOGLE_APPLICATION_CREDENTIALS_VAR) {
        Ok(path) => ServiceAccountKey::from_file(path),
        Err(_) => Err(BuildError::missing_field("signer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests::FakeClock;
    use crate::jws::decode;
    use crate::key::tests::key_json;
    use crate::scopes::{COMPUTE_READONLY_SCOPE, COMPUTE_SCOPE};
    use crate::signer::hs256::HmacSigner;
    use crate::signer::tests::FakeSigner;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serde_json::json;
    use serial_test::{parallel, serial};
    use test_case::test_case;
    use time::OffsetDateTime;

    type TestResult = anyhow::Result<()>;

    fn start() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn compute() -> ScopeSet {
        ScopeSet::new([COMPUTE_SCOPE]).unwrap()
    }

    fn readonly() -> ScopeSet {
        ScopeSet::new([COMPUTE_READONLY_SCOPE]).unwrap()
    }

    fn test_key() -> ServiceAccountKey {
        ServiceAccountKey::from_json(&key_json().to_string()).unwrap()
    }

    fn bearer(request: &http::Request<()>) -> anyhow::Result<String> {
        let value = request
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(|| anyhow::anyhow!("missing authorization header"))?;
        let value = value.to_str()?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| anyhow::anyhow!("not a bearer token: {value}"))?;
        Ok(token.to_string())
    }

    #[tokio::test]
    #[parallel]
    async fn authenticate_with_key() -> TestResult {
        let auth = Builder::default()
            .service_account_key(test_key())
            .clock(FakeClock::new(start()))
            .build()?;
        let request = http::Request::builder().uri("https://compute.googleapis.com/").body(())?;
        let request = auth.authenticate(request, &compute()).await?;
        let token = bearer(&request)?;

        let decoded = decode(&token)?;
        assert_eq!(decoded.header.alg, "RS256");
        assert_eq!(decoded.header.kid.as_deref(), Some("test-private-key-id"));
        assert_eq!(decoded.claims.string("iss"), Some("test-client-email"));
        assert_eq!(
            decoded.claims.string("aud"),
            Some("https://test.example.com/token")
        );
        assert_eq!(decoded.claims.string("scope"), Some(COMPUTE_SCOPE));
        assert_eq!(decoded.claims.issued_at(), Some(1_700_000_000));
        assert_eq!(decoded.claims.expires_at(), Some(1_700_003_600));
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn authenticate_uses_cache() -> TestResult {
        let fake = FakeSigner::new(&[1, 2, 3]);
        let auth = Builder::default()
            .signer(fake.clone())
            .issuer("sa@example.com")
            .clock(FakeClock::new(start()))
            .build()?;

        let first = auth.headers(&compute()).await?;
        let second = auth.headers(&compute()).await?;
        assert_eq!(first, second);
        assert_eq!(fake.calls(), 1);

        let other = auth.headers(&readonly()).await?;
        assert_ne!(first, other);
        assert_eq!(fake.calls(), 2);

        let value = first.get(AUTHORIZATION).unwrap();
        assert!(value.is_sensitive());
        assert!(value.to_str()?.starts_with("Bearer "), "{value:?}");
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn mint_token_bypasses_cache() -> TestResult {
        let fake = FakeSigner::new(&[1, 2, 3]);
        let auth = Builder::default()
            .signer(fake.clone())
            .issuer("sa@example.com")
            .build()?;
        let a = auth.mint_token(&compute()).await?;
        let b = auth.mint_token(&compute()).await?;
        assert_eq!(fake.calls(), 2);
        assert_eq!(decode(&a)?.claims.string("iss"), Some("sa@example.com"));
        assert_eq!(decode(&b)?.claims.string("aud"), Some(DEFAULT_TOKEN_URI));
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn refreshes_expired_tokens() -> TestResult {
        let clock = FakeClock::new(start());
        let fake = FakeSigner::new(&[1, 2, 3]);
        let auth = Builder::default()
            .signer(fake.clone())
            .issuer("sa@example.com")
            .token_lifetime(Duration::from_secs(600))
            .clock(clock.clone())
            .build()?;

        let first = auth.token(&compute()).await?;
        clock.advance(Duration::from_secs(600));
        let second = auth.token(&compute()).await?;
        assert_ne!(first.token, second.token);
        assert_eq!(fake.calls(), 2);
        assert!(second.expires_at > clock.now() + DEFAULT_SKEW_MARGIN);
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn claims_from_builder() -> TestResult {
        let auth = Builder::default()
            .signer(HmacSigner::new("secret")?.with_key_id("k1"))
            .issuer("iss@example.com")
            .audience("https://aud.example.com")
            .subject("user@example.com")
            .extension_claim("target_audience", "https://svc.example.com")
            .clock(FakeClock::new(start()))
            .build()?;
        let decoded = decode(&auth.mint_token(&compute()).await?)?;
        assert_eq!(decoded.header.alg, "HS256");
        assert_eq!(decoded.header.kid.as_deref(), Some("k1"));
        assert_eq!(decoded.claims.string("iss"), Some("iss@example.com"));
        assert_eq!(decoded.claims.string("aud"), Some("https://aud.example.com"));
        assert_eq!(decoded.claims.string("sub"), Some("user@example.com"));
        assert_eq!(
            decoded.claims.string("target_audience"),
            Some("https://svc.example.com")
        );
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn signing_failure() -> TestResult {
        let auth = Builder::default()
            .signer(FakeSigner::failing("hsm unavailable"))
            .issuer("sa@example.com")
            .build()?;
        let request = http::Request::builder().uri("https://compute.googleapis.com/").body(())?;
        let err = auth.authenticate(request, &compute()).await.unwrap_err();
        assert!(err.is_signing(), "{err:?}");
        assert!(err.is_transient(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn token_endpoint() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(url_decoded(contains((
                    "grant_type",
                    "urn:ietf:params:oauth:grant-type:jwt-bearer"
                )))),
            ])
            .times(1)
            .respond_with(json_encoded(json!({
                "access_token": "test-access-token",
                "token_type": "Bearer",
                "expires_in": 3600,
            }))),
        );

        let auth = Builder::default()
            .signer(FakeSigner::new(&[1, 2, 3]))
            .issuer("sa@example.com")
            .token_endpoint(server.url("/token").to_string())
            .clock(FakeClock::new(start()))
            .build()?;
        for _ in 0..3 {
            let headers = auth.headers(&compute()).await?;
            assert_eq!(
                headers.get(AUTHORIZATION).unwrap(),
                "Bearer test-access-token"
            );
        }
        // The assertion still carries the token endpoint as its audience.
        let decoded = decode(&auth.mint_token(&compute()).await?)?;
        assert_eq!(
            decoded.claims.string("aud"),
            Some(server.url("/token").to_string().as_str())
        );
        Ok(())
    }

    #[test_case(0; "already expired")]
    #[test_case(10; "inside the skew margin")]
    #[parallel]
    #[tokio::test]
    async fn token_endpoint_expiring_too_soon(expires_in: u64) -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token"))
                .times(2)
                .respond_with(json_encoded(json!({
                    "access_token": "short-lived-token",
                    "expires_in": expires_in,
                }))),
        );

        let auth = Builder::default()
            .signer(FakeSigner::new(&[1, 2, 3]))
            .issuer("sa@example.com")
            .token_endpoint(server.url("/token").to_string())
            .clock(FakeClock::new(start()))
            .build()?;
        for _ in 0..2 {
            let err = auth.authenticate(http::Request::new(()), &compute()).await.unwrap_err();
            assert!(err.is_exchange(), "{err:?}");
            assert!(!err.is_transient(), "{err:?}");
        }
        Ok(())
    }

    #[test_case(Duration::from_secs(30); "equal to skew")]
    #[test_case(Duration::from_secs(10); "shorter than skew")]
    #[test_case(Duration::from_secs(3601); "too long")]
    #[parallel]
    fn invalid_lifetime(lifetime: Duration) {
        let err = Builder::default()
            .signer(FakeSigner::new(&[1]))
            .issuer("sa@example.com")
            .token_lifetime(lifetime)
            .build()
            .unwrap_err();
        assert!(err.is_invalid(), "{err:?}");
    }

    #[test]
    #[parallel]
    fn invalid_token_endpoint() {
        let err = Builder::default()
            .signer(FakeSigner::new(&[1]))
            .issuer("sa@example.com")
            .token_endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(err.is_invalid(), "{err:?}");
    }

    #[test]
    #[parallel]
    fn missing_issuer() {
        let err = Builder::default()
            .signer(FakeSigner::new(&[1]))
            .build()
            .unwrap_err();
        assert!(err.is_missing_field(), "{err:?}");
        assert!(err.to_string().contains("issuer"), "{err}");
    }

    #[test]
    #[parallel]
    fn invalid_key() {
        let mut key = test_key();
        key.private_key = "not a pem".to_string();
        let err = Builder::default()
            .service_account_key(key)
            .build()
            .unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
    }

    #[test]
    #[serial]
    fn missing_signer() {
        let _e = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS_VAR);
        let err = Builder::default()
            .issuer("sa@example.com")
            .build()
            .unwrap_err();
        assert!(err.is_missing_field(), "{err:?}");
        assert!(err.to_string().contains("signer"), "{err}");
    }

    #[tokio::test]
    #[serial]
    async fn key_from_env_var() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, key_json().to_string())?;
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS_VAR, path.to_str().unwrap());

        let auth = Builder::default().build()?;
        let decoded = decode(&auth.mint_token(&compute()).await?)?;
        assert_eq!(decoded.header.kid.as_deref(), Some("test-private-key-id"));
        assert_eq!(decoded.claims.string("iss"), Some("test-client-email"));
        Ok(())
    }

    #[test]
    #[serial]
    fn key_from_env_var_missing_file() {
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS_VAR, "/no/such/dir/key.json");
        let err = Builder::default().build().unwrap_err();
        assert!(err.is_loading(), "{err:?}");
    }
}
