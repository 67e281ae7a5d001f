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

//! Errors returned while minting, caching, or attaching a credential.

use crate::signer::SigningError;
use http::StatusCode;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Represents an error obtaining or attaching a credential.
///
/// The cache shares the outcome of a single mint with every caller waiting on
/// it, so this type is cheap to clone.
///
/// Use [AuthError::is_transient] to decide if the operation may succeed on a
/// later attempt. Applications should use [Exponential backoff] in their retry
/// loops. Errors that are not transient (for example, an invalid scope set)
/// will not go away without changes in the caller.
///
/// [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
#[derive(thiserror::Error, Clone, Debug)]
#[error(transparent)]
pub struct AuthError(ErrorKind);

impl AuthError {
    /// The requested scope set is empty or malformed.
    pub fn is_invalid_scope(&self) -> bool {
        matches!(self.0, ErrorKind::InvalidScope(_))
    }

    /// The signing backend failed, or the key material is unusable.
    pub fn is_signing(&self) -> bool {
        matches!(self.0, ErrorKind::Signing(_))
    }

    /// The system clock is unreliable relative to the issued tokens.
    pub fn is_clock_skew(&self) -> bool {
        matches!(self.0, ErrorKind::ClockSkew(_))
    }

    /// The header or claims could not be encoded.
    pub fn is_encoding(&self) -> bool {
        matches!(self.0, ErrorKind::Encoding(_))
    }

    /// The token endpoint rejected the assertion or could not be reached.
    pub fn is_exchange(&self) -> bool {
        matches!(self.0, ErrorKind::Exchange { .. })
    }

    /// The mint ended without producing a token or an error.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.0, ErrorKind::Interrupted)
    }

    /// Returns `true` if a later attempt may succeed.
    ///
    /// Transient errors mean "could not obtain a credential right now".
    /// Non-transient errors mean the scope set or the configuration is
    /// invalid.
    pub fn is_transient(&self) -> bool {
        match &self.0 {
            ErrorKind::InvalidScope(_) | ErrorKind::Encoding(_) => false,
            ErrorKind::Signing(e) => !e.is_parsing(),
            ErrorKind::ClockSkew(_) | ErrorKind::Interrupted => true,
            ErrorKind::Exchange { transient, .. } => *transient,
        }
    }

    pub(crate) fn invalid_scope<T: Into<String>>(message: T) -> AuthError {
        AuthError(ErrorKind::InvalidScope(message.into()))
    }

    pub(crate) fn signing(source: SigningError) -> AuthError {
        AuthError(ErrorKind::Signing(Arc::new(source)))
    }

    pub(crate) fn clock_skew<T: Into<String>>(message: T) -> AuthError {
        AuthError(ErrorKind::ClockSkew(message.into()))
    }

    pub(crate) fn encoding<T>(source: T) -> AuthError
    where
        T: Into<BoxError>,
    {
        let source: BoxError = source.into();
        AuthError(ErrorKind::Encoding(SharedError::from(source)))
    }

    pub(crate) fn exchange<T>(transient: bool, source: T) -> AuthError
    where
        T: Into<BoxError>,
    {
        let source: BoxError = source.into();
        AuthError(ErrorKind::Exchange {
            transient,
            source: SharedError::from(source),
        })
    }

    pub(crate) fn interrupted() -> AuthError {
        AuthError(ErrorKind::Interrupted)
    }
}

#[derive(thiserror::Error, Clone, Debug)]
enum ErrorKind {
    #[error("invalid scope request: {0}")]
    InvalidScope(String),
    #[error("cannot sign the token assertion: {0}")]
    Signing(#[source] Arc<SigningError>),
    #[error("the system clock is unreliable: {0}")]
    ClockSkew(String),
    #[error("cannot encode the token: {0}")]
    Encoding(#[source] SharedError),
    #[error("cannot exchange the assertion for an access token: {source}")]
    Exchange {
        transient: bool,
        #[source]
        source: SharedError,
    },
    #[error("the token mint ended without a result")]
    Interrupted,
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    match c {
        // Internal server errors do not indicate that there is anything wrong
        // with our request, so we retry them.
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use test_case::test_case;

    #[test_case(StatusCode::INTERNAL_SERVER_ERROR)]
    #[test_case(StatusCode::SERVICE_UNAVAILABLE)]
    #[test_case(StatusCode::REQUEST_TIMEOUT)]
    #[test_case(StatusCode::TOO_MANY_REQUESTS)]
    fn retryable(c: StatusCode) {
        assert!(is_retryable(c));
    }

    #[test_case(StatusCode::NOT_FOUND)]
    #[test_case(StatusCode::UNAUTHORIZED)]
    #[test_case(StatusCode::BAD_REQUEST)]
    #[test_case(StatusCode::BAD_GATEWAY)]
    #[test_case(StatusCode::PRECONDITION_FAILED)]
    fn non_retryable(c: StatusCode) {
        assert!(!is_retryable(c));
    }

    #[test]
    fn invalid_scope() {
        let e = AuthError::invalid_scope("test-only-err-123");
        assert!(e.is_invalid_scope(), "{e:?}");
        assert!(!e.is_transient(), "{e:?}");
        assert!(e.source().is_none(), "{e:?}");
        assert!(e.to_string().contains("test-only-err-123"), "{e}");
    }

    #[test]
    fn signing() {
        let e = AuthError::signing(SigningError::sign("backend down"));
        assert!(e.is_signing(), "{e:?}");
        assert!(e.is_transient(), "{e:?}");
        assert!(e.source().is_some(), "{e:?}");
        assert!(e.to_string().contains("backend down"), "{e}");

        let e = AuthError::signing(SigningError::parsing("bad pem"));
        assert!(e.is_signing(), "{e:?}");
        assert!(!e.is_transient(), "{e:?}");
    }

    #[test]
    fn clock_skew() {
        let e = AuthError::clock_skew("clock moved backwards");
        assert!(e.is_clock_skew(), "{e:?}");
        assert!(e.is_transient(), "{e:?}");
        assert!(e.to_string().contains("clock moved backwards"), "{e}");
    }

    #[test]
    fn encoding() {
        let e = AuthError::encoding("bad claims");
        assert!(e.is_encoding(), "{e:?}");
        assert!(!e.is_transient(), "{e:?}");
        assert!(e.source().is_some(), "{e:?}");
    }

    #[test]
    fn exchange() {
        let e = AuthError::exchange(true, "try again");
        assert!(e.is_exchange(), "{e:?}");
        assert!(e.is_transient(), "{e:?}");

        let e = AuthError::exchange(false, "denied");
        assert!(e.is_exchange(), "{e:?}");
        assert!(!e.is_transient(), "{e:?}");
        assert!(e.to_string().contains("denied"), "{e}");
    }

    #[test]
    fn interrupted() {
        let e = AuthError::interrupted();
        assert!(e.is_interrupted(), "{e:?}");
        assert!(e.is_transient(), "{e:?}");
    }

    #[test]
    fn clones_share_classification() {
        let e = AuthError::signing(SigningError::sign("epic fail"));
        let c = e.clone();
        assert_eq!(e.is_signing(), c.is_signing());
        assert_eq!(e.to_string(), c.to_string());
    }
}
