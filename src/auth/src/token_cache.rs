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

use crate::Result;
use crate::clock::Clock;
use crate::errors::AuthError;
use crate::scopes::ScopeSet;
use crate::token::{Token, TokenProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};

// `None` until the mint completes.
type MintResult = Option<Result<Token>>;

/// A token held by the cache, with the scope set it was minted for.
#[derive(Clone, Debug)]
pub(crate) struct CachedToken {
    pub(crate) scopes: ScopeSet,
    pub(crate) token: Token,
}

#[derive(Debug)]
enum Entry {
    Valid(CachedToken),
    // A mint is in progress. Waiters clone the receiver.
    Minting(watch::Receiver<MintResult>),
}

/// Caches one token per scope set and collapses concurrent mints.
///
/// The first caller that finds no usable token for a scope set starts a mint
/// on a new task. Every other caller for the same scope set waits on that
/// mint and receives the same result. The mint runs to completion even if all
/// its callers are cancelled. On success the entry is replaced, on failure
/// the entry is removed and the error goes to every waiter.
#[derive(Clone, Debug)]
pub(crate) struct TokenCache {
    entries: Arc<Mutex<HashMap<ScopeSet, Entry>>>,
    inner: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    skew_margin: Duration,
}

enum Freshness {
    Valid,
    Stale,
    // The clock moved backwards past the issue time.
    Skewed,
}

fn freshness(token: &Token, now: OffsetDateTime, skew_margin: Duration) -> Freshness {
    if now + skew_margin < token.issued_at {
        return Freshness::Skewed;
    }
    if now + skew_margin < token.expires_at {
        return Freshness::Valid;
    }
    Freshness::Stale
}

// A new token must be usable when it is published.
fn check_fresh(token: Token, now: OffsetDateTime, skew_margin: Duration) -> Result<Token> {
    match freshness(&token, now, skew_margin) {
        Freshness::Valid => Ok(token),
        Freshness::Skewed => Err(AuthError::clock_skew(format!(
            "the new token was issued at {:?}, after the current time {now:?}",
            token.issued_at
        ))),
        Freshness::Stale => Err(AuthError::exchange(
            false,
            format!(
                "the new token expires at {:?}, inside the {skew_margin:?} skew margin",
                token.expires_at
            ),
        )),
    }
}

enum Action {
    Hit(Token),
    Skewed(CachedToken),
    Wait(watch::Receiver<MintResult>),
    Mint,
}

impl TokenCache {
    pub(crate) fn new<T>(inner: T, clock: Arc<dyn Clock>, skew_margin: Duration) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            inner: Arc::new(inner),
            clock,
            skew_margin,
        }
    }

    /// Returns a valid token for `scopes`, minting one if needed.
    pub(crate) async fn token(&self, scopes: &ScopeSet) -> Result<Token> {
        let mut rx = {
            let mut entries = self.entries.lock().await;
            let now = self.clock.now();
            let action = match entries.get(scopes) {
                Some(Entry::Valid(cached)) => match freshness(&cached.token, now, self.skew_margin)
                {
                    Freshness::Valid => Action::Hit(cached.token.clone()),
                    Freshness::Skewed => Action::Skewed(cached.clone()),
                    Freshness::Stale => Action::Mint,
                },
                Some(Entry::Minting(rx)) => Action::Wait(rx.clone()),
                None => Action::Mint,
            };
            match action {
                Action::Hit(token) => return Ok(token),
                Action::Skewed(cached) => {
                    entries.remove(scopes);
                    tracing::warn!(
                        scopes = %cached.scopes,
                        issued_at = ?cached.token.issued_at,
                        now = ?now,
                        "the clock moved backwards, dropping the cached token"
                    );
                    return Err(AuthError::clock_skew(format!(
                        "the cached token was issued at {:?}, after the current time {now:?}",
                        cached.token.issued_at
                    )));
                }
                Action::Wait(rx) => rx,
                Action::Mint => self.start_mint(&mut entries, scopes),
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map(|r| (*r).clone().unwrap_or_else(|| Err(AuthError::interrupted())));
        match outcome {
            Ok(result) => result,
            Err(_) => {
                // The mint task ended without publishing a result.
                let mut entries = self.entries.lock().await;
                let orphaned = matches!(
                    entries.get(scopes),
                    Some(Entry::Minting(current)) if current.same_channel(&rx)
                );
                if orphaned {
                    entries.remove(scopes);
                }
                tracing::warn!(%scopes, "the token mint ended without a result");
                Err(AuthError::interrupted())
            }
        }
    }

    // Publishes a pending entry and spawns the mint. Must be called with the
    // entries lock held.
    fn start_mint(
        &self,
        entries: &mut HashMap<ScopeSet, Entry>,
        scopes: &ScopeSet,
    ) -> watch::Receiver<MintResult> {
        let (tx, rx) = watch::channel(None);
        entries.insert(scopes.clone(), Entry::Minting(rx.clone()));

        let shared = self.entries.clone();
        let inner = self.inner.clone();
        let clock = self.clock.clone();
        let skew_margin = self.skew_margin;
        let scopes = scopes.clone();
        tokio::spawn(async move {
            tracing::debug!(%scopes, "minting a new token");
            let result = inner
                .token(&scopes)
                .await
                .and_then(|token| check_fresh(token, clock.now(), skew_margin));
            let mut entries = shared.lock().await;
            match &result {
                Ok(token) => {
                    tracing::debug!(%scopes, expires_at = ?token.expires_at, "minted a new token");
                    let cached = CachedToken {
                        scopes: scopes.clone(),
                        token: token.clone(),
                    };
                    entries.insert(scopes, Entry::Valid(cached));
                }
                Err(e) => {
                    tracing::warn!(%scopes, error = %e, "cannot mint a new token");
                    entries.remove(&scopes);
                }
            }
            tx.send_replace(Some(result));
        });
        rx
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, scopes: &ScopeSet) -> bool {
        matches!(self.entries.lock().await.get(scopes), Some(Entry::Valid(_)))
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
