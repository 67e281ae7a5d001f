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

//! Errors created during authenticator construction.

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for [Authenticator] builders and key loading.
///
/// Applications rarely need to create instances of this error type. The
/// exception might be when testing application code, where the application is
/// mocking a client library behavior.
///
/// [Authenticator]: crate::authenticator::Authenticator
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct BuildError(ErrorKind);

impl BuildError {
    /// A problem finding or opening the key file.
    pub fn is_loading(&self) -> bool {
        matches!(self.0, ErrorKind::Loading(_))
    }

    /// A problem parsing the key file or the key material.
    pub fn is_parsing(&self) -> bool {
        matches!(self.0, ErrorKind::Parsing(_))
    }

    /// A required field was missing from the builder.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.0, ErrorKind::MissingField(_))
    }

    /// A builder setting is out of range or inconsistent with other settings.
    pub fn is_invalid(&self) -> bool {
        matches!(self.0, ErrorKind::Invalid(_))
    }

    /// Create an error representing problems loading or reading a key file.
    pub(crate) fn loading<T>(source: T) -> BuildError
    where
        T: Into<BoxError>,
    {
        BuildError(ErrorKind::Loading(source.into()))
    }

    /// A problem parsing a key file or key material.
    pub(crate) fn parsing<T>(source: T) -> BuildError
    where
        T: Into<BoxError>,
    {
        BuildError(ErrorKind::Parsing(source.into()))
    }

    /// A required field was missing from the builder.
    pub(crate) fn missing_field(field: &'static str) -> BuildError {
        BuildError(ErrorKind::MissingField(field))
    }

    /// A setting is out of range.
    pub(crate) fn invalid<T: Into<String>>(message: T) -> BuildError {
        BuildError(ErrorKind::Invalid(message.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("could not find or open the key file {0}")]
    Loading(#[source] BoxError),
    #[error("cannot parse the key {0}")]
    Parsing(#[source] BoxError),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn constructors() {
        let error = BuildError::loading("test message");
        assert!(error.is_loading(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("test message"), "{error}");

        let error = BuildError::parsing("test message");
        assert!(error.is_parsing(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("test message"), "{error}");

        let error = BuildError::missing_field("test field");
        assert!(error.is_missing_field(), "{error:?}");
        assert!(error.source().is_none(), "{error:?}");
        assert!(error.to_string().contains("test field"), "{error}");

        let error = BuildError::invalid("lifetime too long");
        assert!(error.is_invalid(), "{error:?}");
        assert!(error.source().is_none(), "{error:?}");
        assert!(error.to_string().contains("lifetime too long"), "{error}");
    }
}
