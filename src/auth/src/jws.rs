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

//! The [JWS compact serialization] of token assertions.
//!
//! Each segment is the unpadded, URL-safe base64 encoding of its contents.
//! The header and claims segments encode JSON, the signature segment encodes
//! raw bytes.
//!
//! [JWS compact serialization]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.1

use crate::Result;
use crate::claims::Claims;
use crate::constants::JWT_TYPE;
use crate::errors::AuthError;
use crate::signer::Signer;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The header that describes how a token was signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// A `JWT` header for the given algorithm.
    pub fn new<T: Into<String>>(alg: T) -> Self {
        Self {
            alg: alg.into(),
            typ: JWT_TYPE.to_string(),
            kid: None,
        }
    }

    /// The header for tokens signed by `signer`.
    pub fn for_signer(signer: &Signer) -> Self {
        Self {
            kid: signer.key_id().map(str::to_string),
            ..Self::new(signer.algorithm())
        }
    }
}

/// A header and claims pair, ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
    header: Header,
    claims: Claims,
}

impl TokenRequest {
    pub fn new(header: Header, claims: Claims) -> Self {
        Self { header, claims }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Consumes the request and returns the `header.claims` signing input.
    pub fn signing_input(self) -> Result<String> {
        let header = encode_segment(&self.header)?;
        let claims = encode_segment(&self.claims)?;
        Ok(format!("{header}.{claims}"))
    }
}

/// Encodes `value` as JSON, then as unpadded URL-safe base64.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(AuthError::encoding)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
}

/// The inverse of [encode_segment].
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let json = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(AuthError::encoding)?;
    serde_json::from_slice(&json).map_err(AuthError::encoding)
}

/// Appends the encoded `signature` to the signing input.
pub fn compact(signing_input: &str, signature: &[u8]) -> String {
    format!(
        "{signing_input}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    )
}

/// A token split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedToken {
    pub header: Header,
    pub claims: Claims,
    pub signature: Vec<u8>,
}

/// Decodes a compact token.
///
/// The signature is not verified.
pub fn decode(token: &str) -> Result<DecodedToken> {
    let mut parts = token.split('.');
    let (Some(header), Some(claims), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::encoding(
            "a compact token must have exactly three segments",
        ));
    };
    let signature = BASE64_URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(AuthError::encoding)?;
    Ok(DecodedToken {
        header: decode_segment(header)?,
        claims: decode_segment(claims)?,
        signature,
    })
}
