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

//! Google Cloud Client Libraries for Rust - OAuth2 JWT Bearer Assertions
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. Testing is also incomplete, we do
//! **not** recommend that you use this crate in production. We welcome feedback
//! about the APIs, documentation, missing features, bugs, etc.
//!
//! This crate mints, signs and caches the [JWT bearer assertions] used to
//! authenticate calls to Google Cloud APIs, and attaches them to outgoing
//! requests.
//!
//! A token is built in three steps: the [claims] for the requested
//! [scopes], the [jws] compact serialization of a header and the claims, and
//! the signature from a pluggable [signer]. The [binder] drives these steps.
//! The [authenticator] keeps one token per scope set, mints a new one when
//! the cached token is about to expire, and collapses concurrent requests for
//! the same scope set into a single mint.
//!
//! [JWT bearer assertions]: https://datatracker.ietf.org/doc/html/rfc7523

pub mod authenticator;
pub mod binder;
pub mod build_errors;
pub mod claims;
pub mod clock;
pub mod errors;
pub mod jws;
pub mod key;
pub mod scopes;
pub mod signer;
pub mod token;

pub(crate) mod constants;
pub(crate) mod exchange;

/// Headers utility functions to attach tokens to requests.
pub(crate) mod headers_util;

/// The token cache
pub(crate) mod token_cache;

/// A `Result` alias where the `Err` case is
/// `google_cloud_jwt_auth::errors::AuthError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::AuthError>;
